use log::{debug, warn};
use std::borrow::Cow;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::shell::error::ShellError;
use crate::shell::executor::{Executor, Outcome};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::shell::tokenizer::tokenize;
use crate::utils::config::Config;
use crate::utils::theme::Theme;

pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    executor: Executor,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            theme: Theme::load_theme(&config.theme),
            executor: Executor::new(config.max_tokens),
        }
    }

    /// 交互模式：致命错误只报告，不退出
    pub fn run_interactive(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("初始化 xish...");
        signals::ignore_interactive_signals();
        let mut readline = ReadlineManager::new(self.config)?;
        readline.load_history();

        loop {
            io::stdout().flush()?;
            match readline.readline(&self.theme.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        readline.add_history(&line)?;
                    }
                    if let Err(e) = self.handle_line(&line) {
                        eprintln!(
                            "{}",
                            (self.theme.error_style)(format!(
                                "{}\nFailed executing command:\n    {}",
                                e,
                                line.trim()
                            ))
                        );
                    }
                    if self.executor.exit_requested() {
                        debug!("执行了 exit，退出 xish...");
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    warn!("接收到中断信号...");
                }
                Err(ReadlineError::Eof) => {
                    debug!("接收到 EOF，退出 xish...");
                    break;
                }
                Err(err) => {
                    eprintln!("{}", (self.theme.error_style)(format!("readline: {}", err)));
                    break;
                }
            }
            self.executor.reap_completed()?;
        }

        readline.save_history();
        self.executor.reap_completed()?;
        Ok(())
    }

    /// 逐行执行脚本；遇到致命错误时报告所在行并停止，错误本身由调用方报告。
    /// 不是合法 UTF-8 的字节被替换后照常执行。
    pub fn run_script<R: BufRead>(&mut self, name: &str, mut reader: R) -> Result<(), ShellError> {
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;

            let text = String::from_utf8_lossy(&buf);
            if let Cow::Owned(_) = text {
                warn!("'{}' 第 {} 行不是合法的 UTF-8，无效字节已被替换", name, line_no);
            }
            let line = text.trim_end_matches(&['\n', '\r'][..]);

            if let Err(e) = self.handle_line(line) {
                eprintln!(
                    "{}",
                    (self.theme.error_style)(format!(
                        "Failure executing '{}' line {}:\n    {}",
                        name,
                        line_no,
                        line.trim()
                    ))
                );
                return Err(e);
            }
            self.executor.reap_completed()?;
            if self.executor.exit_requested() {
                debug!("'{}' 第 {} 行执行了 exit", name, line_no);
                break;
            }
        }
        self.executor.reap_completed()
    }

    pub fn run_script_file(&mut self, path: &Path) -> Result<(), ShellError> {
        let file = File::open(path).map_err(|e| {
            ShellError::Io(io::Error::new(
                e.kind(),
                format!("Cannot open input script '{}' : {}", path.display(), e),
            ))
        })?;
        self.run_script(&path.display().to_string(), BufReader::new(file))
    }

    fn handle_line(&mut self, line: &str) -> Result<Outcome, ShellError> {
        let tokens = match tokenize(line, self.config.max_tokens) {
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("{}", (self.theme.warning_style)(e.to_string()));
                return Ok(Outcome::Failure);
            }
        };
        if tokens.is_empty() {
            return Ok(Outcome::Success);
        }

        self.executor.execute_line(&tokens)
    }

    pub fn exit_requested(&self) -> bool {
        self.executor.exit_requested()
    }
}
