use std::env;

use log::debug;

use crate::shell::error::{Result, ShellError};

use super::job_table::JobId;
use super::launcher::StageLauncher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Pwd,
    Intr,
    Exit,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "pwd" => Some(Builtin::Pwd),
            "intr" => Some(Builtin::Intr),
            "exit" => Some(Builtin::Exit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Cd => "cd",
            Builtin::Pwd => "pwd",
            Builtin::Intr => "intr",
            Builtin::Exit => "exit",
        }
    }
}

/// 执行内建命令，返回的错误都是非致命的
pub(super) fn run(builtin: Builtin, args: &[String], ctx: &mut StageLauncher<'_>) -> Result<()> {
    match builtin {
        Builtin::Cd => builtin_cd(args),
        Builtin::Pwd => builtin_pwd(args, ctx),
        Builtin::Intr => builtin_intr(args, ctx),
        Builtin::Exit => builtin_exit(args, ctx),
    }
}

fn builtin_cd(args: &[String]) -> Result<()> {
    let path = match args {
        [] => return Err(ShellError::Usage("no directory specified".to_string())),
        [path] => path,
        _ => return Err(ShellError::Usage("too many arguments".to_string())),
    };
    let target = shellexpand::tilde(path);
    env::set_current_dir(&*target).map_err(|source| ShellError::ChangeDir {
        path: path.clone(),
        source,
    })?;
    debug!("切换目录到: {}", target);
    Ok(())
}

fn builtin_pwd(args: &[String], ctx: &mut StageLauncher<'_>) -> Result<()> {
    if !args.is_empty() {
        return Err(ShellError::Usage("too many arguments".to_string()));
    }
    let dir = env::current_dir().map_err(ShellError::CurrentDir)?;
    writeln!(ctx.out, "{}", dir.display())?;
    ctx.out.flush()?;
    Ok(())
}

fn builtin_intr(args: &[String], ctx: &mut StageLauncher<'_>) -> Result<()> {
    match args {
        [] => {
            for completion in ctx.jobs.interrupt_all() {
                writeln!(ctx.diag, "{}", completion)?;
            }
            Ok(())
        }
        [job] => {
            let job_id: JobId = job
                .parse()
                .map_err(|_| ShellError::Usage(format!("invalid job id '{}'", job)))?;
            let pid = ctx.jobs.interrupt_one(job_id)?;
            debug!("向任务 [{}] (pid {}) 发送 SIGINT", job_id, pid);
            Ok(())
        }
        _ => Err(ShellError::Usage("too many arguments".to_string())),
    }
}

fn builtin_exit(args: &[String], ctx: &mut StageLauncher<'_>) -> Result<()> {
    if !args.is_empty() {
        return Err(ShellError::Usage("too many arguments".to_string()));
    }
    debug!("请求退出 xish");
    ctx.exit_requested = true;
    Ok(())
}
