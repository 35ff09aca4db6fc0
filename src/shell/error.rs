use std::io;

use nix::errno::Errno;
use thiserror::Error;

use crate::shell::executor::JobId;

/// 执行一行命令时可能出现的错误
///
/// 内建命令和变量赋值的错误只会被报告（非致命），
/// 从 `Executor::execute_line` 返回的错误（如 `Pipe`、`Fork`）则是致命的，会中止该行剩余的工作。
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Invalid variable assignment: {0}")]
    InvalidAssignment(String),

    #[error("no such job id {0}")]
    JobNotFound(JobId),

    #[error("{0}")]
    Usage(String),

    #[error("cannot change to directory '{path}' : {source}")]
    ChangeDir {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot get current directory : {0}")]
    CurrentDir(#[source] io::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("Failed to create pipe : {0}")]
    Pipe(#[source] Errno),

    #[error("Failed to create a child process : {0}")]
    Fork(#[source] Errno),

    #[error("Failed to signal process {pid} : {source}")]
    Signal {
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
