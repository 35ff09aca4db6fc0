use std::io::{self, Write};

use log::{debug, info};

use crate::shell::error::Result;

use super::expand::Expander;
use super::job_table::JobTable;
use super::launcher::StageLauncher;
use super::pipeline::CommandLine;
use super::variable::VariableStore;

/// 一行命令的非致命结果；致命错误通过 `Err` 返回
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn and(self, other: Outcome) -> Outcome {
        match (self, other) {
            (Outcome::Success, Outcome::Success) => Outcome::Success,
            _ => Outcome::Failure,
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

pub struct Executor {
    jobs: JobTable,
    variables: VariableStore,
    max_tokens: usize,
    out: Box<dyn Write>,
    diag: Box<dyn Write>,
    exit_requested: bool,
}

impl Executor {
    pub fn new(max_tokens: usize) -> Self {
        Self::with_streams(max_tokens, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// `out` 接收内建命令的输出，`diag` 接收错误和进程状态报告
    pub fn with_streams(max_tokens: usize, out: Box<dyn Write>, diag: Box<dyn Write>) -> Self {
        Self {
            jobs: JobTable::new(),
            variables: VariableStore::new(),
            max_tokens,
            out,
            diag,
            exit_requested: false,
        }
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// 某一行执行了 `exit`，调用方应当停止读取输入
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// 执行一行命令，结束后总会回收已经结束的后台进程
    pub fn execute_line(&mut self, tokens: &[String]) -> Result<Outcome> {
        let result = self.run_line(tokens);
        let reaped = self.reap_completed();
        let outcome = result?;
        reaped?;
        Ok(outcome)
    }

    fn run_line(&mut self, tokens: &[String]) -> Result<Outcome> {
        if tokens.is_empty() {
            return Ok(Outcome::Success);
        }
        info!(" + {}", shell_words::join(tokens));

        let expander = Expander::new(&self.variables, self.max_tokens);
        let substituted = expander.substitute(tokens);
        debug!("After variable substitution: {}", shell_words::join(&substituted));
        let expanded = expander.glob_expand(&substituted);
        debug!("After globbing: {}", shell_words::join(&expanded));

        match CommandLine::parse(expanded) {
            Ok(CommandLine::Empty) => Ok(Outcome::Success),
            Ok(CommandLine::Assignment { name, value }) => {
                match self.variables.set(name, value) {
                    Ok(()) => Ok(Outcome::Success),
                    Err(e) => self.report(e),
                }
            }
            Ok(CommandLine::Pipeline(pipeline)) => {
                let mut launcher =
                    StageLauncher::new(&mut self.jobs, &mut *self.out, &mut *self.diag);
                let outcome = pipeline.run(&mut launcher);
                self.exit_requested |= launcher.exit_requested();
                outcome
            }
            Err(e) => self.report(e),
        }
    }

    fn report(&mut self, error: impl std::fmt::Display) -> Result<Outcome> {
        writeln!(self.diag, "{}", error)?;
        Ok(Outcome::Failure)
    }

    /// 非阻塞地回收结束的子进程并报告结果
    pub fn reap_completed(&mut self) -> Result<()> {
        for completion in self.jobs.reap_completed() {
            writeln!(self.diag, "{}", completion)?;
        }
        self.diag.flush()?;
        Ok(())
    }
}
