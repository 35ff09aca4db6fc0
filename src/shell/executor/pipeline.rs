use std::fmt;
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use log::{debug, info};

use crate::shell::error::{Result, ShellError};

use super::launcher::{Launched, Stage, StageLauncher};
use super::Outcome;

/// 一对管道描述符。两端都设置了 close-on-exec，drop 时关闭，
/// 因此父进程中每个描述符只会被关闭一次。
#[derive(Debug)]
pub struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    pub fn new() -> Result<Self> {
        let (read, write) = open_pipe().map_err(ShellError::Pipe)?;
        Ok(Self { read, write })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }

    pub fn write_fd(&self) -> RawFd {
        self.write.as_raw_fd()
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.read_fd(), self.write_fd())
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn open_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    use nix::fcntl::OFlag;

    nix::unistd::pipe2(OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn open_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};

    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }
    Ok((read, write))
}

/// 展开之后的一行命令
#[derive(Debug, PartialEq, Eq)]
pub enum CommandLine {
    Empty,
    Assignment { name: String, value: String },
    Pipeline(Pipeline),
}

impl CommandLine {
    pub fn parse(mut tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Ok(CommandLine::Empty);
        }

        // name = value
        if tokens.len() >= 3 && tokens[1] == "=" {
            return match <[String; 3]>::try_from(tokens) {
                Ok([name, _, value]) => Ok(CommandLine::Assignment { name, value }),
                Err(tokens) => Err(ShellError::InvalidAssignment(format!(
                    "expected `name = value`, got {} tokens",
                    tokens.len()
                ))),
            };
        }

        let background = tokens.len() > 1 && tokens.last().is_some_and(|t| t == "&");
        if background {
            tokens.pop();
        }

        let mut stages = Vec::new();
        let mut current = Vec::new();
        for token in tokens {
            if token == "|" {
                if current.is_empty() {
                    return Err(ShellError::Syntax("missing command before '|'".to_string()));
                }
                stages.push(mem::take(&mut current));
            } else {
                current.push(token);
            }
        }
        if current.is_empty() {
            return Err(ShellError::Syntax("missing command after '|'".to_string()));
        }
        stages.push(current);

        Ok(CommandLine::Pipeline(Pipeline { stages, background }))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Vec<String>>,
    /// 对管道中的每一段都生效
    pub background: bool,
}

impl Pipeline {
    /// 段与段之间需要的管道数
    pub fn boundaries(&self) -> usize {
        self.stages.len().saturating_sub(1)
    }

    /// 从左到右启动每一段，全部启动后再按顺序等待前台进程。
    ///
    /// 创建管道失败时立即返回错误，已经启动的段不会回滚。
    pub fn run(&self, launcher: &mut StageLauncher<'_>) -> Result<Outcome> {
        let mut outcome = Outcome::Success;
        let mut foreground = Vec::new();
        let mut read_pipe: Option<Pipe> = None;

        for (index, argv) in self.stages.iter().enumerate() {
            let write_pipe = if index < self.boundaries() {
                Some(Pipe::new()?)
            } else {
                None
            };

            info!(
                "Executing stage {} of {}: {}",
                index + 1,
                self.stages.len(),
                shell_words::join(argv)
            );
            let stage = Stage {
                argv,
                background: self.background,
                read: read_pipe.as_ref(),
                write: write_pipe.as_ref(),
            };
            match launcher.launch(&stage)? {
                Launched::Inline(result) => outcome = outcome.and(result),
                Launched::Process(pid) if !self.background => foreground.push(pid),
                Launched::Process(_) => {}
            }
            if launcher.exit_requested() {
                debug!("exit 之后不再启动或等待其余的段");
                return Ok(outcome);
            }

            // 当前段的写管道成为下一段的读管道，旧的读管道在这里关闭
            if let Some(pipe) = mem::replace(&mut read_pipe, write_pipe) {
                debug!("父进程关闭管道 {}", pipe);
            }
        }

        for pid in foreground {
            launcher.wait_foreground(pid)?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn stages(line: &[&str]) -> Pipeline {
        match CommandLine::parse(tokens(line)).unwrap() {
            CommandLine::Pipeline(pipeline) => pipeline,
            other => panic!("expected a pipeline, got {:?}", other),
        }
    }

    #[test]
    fn splits_on_pipes() {
        let pipeline = stages(&["echo", "hi", "|", "cat"]);
        assert_eq!(pipeline.stages, vec![tokens(&["echo", "hi"]), tokens(&["cat"])]);
        assert!(!pipeline.background);
        assert_eq!(pipeline.boundaries(), 1);
    }

    #[test]
    fn n_stages_need_n_minus_one_pipes() {
        let pipeline = stages(&["a", "|", "b", "x", "|", "c", "|", "d"]);
        assert_eq!(pipeline.stages.len(), 4);
        assert_eq!(pipeline.boundaries(), 3);
        assert_eq!(stages(&["ls"]).boundaries(), 0);
    }

    #[test]
    fn trailing_ampersand_marks_whole_pipeline_background() {
        let pipeline = stages(&["sleep", "5", "|", "cat", "&"]);
        assert!(pipeline.background);
        assert_eq!(pipeline.stages, vec![tokens(&["sleep", "5"]), tokens(&["cat"])]);
    }

    #[test]
    fn lone_ampersand_is_a_command() {
        let pipeline = stages(&["&"]);
        assert!(!pipeline.background);
        assert_eq!(pipeline.stages, vec![tokens(&["&"])]);
    }

    #[test]
    fn assignment_shape() {
        assert_eq!(
            CommandLine::parse(tokens(&["X", "=", "3"])).unwrap(),
            CommandLine::Assignment {
                name: "X".to_string(),
                value: "3".to_string(),
            }
        );
        assert!(matches!(
            CommandLine::parse(tokens(&["X", "=", "3", "4"])),
            Err(ShellError::InvalidAssignment(_))
        ));
        // 两个 token 不是赋值
        assert_eq!(stages(&["X", "="]).stages, vec![tokens(&["X", "="])]);
    }

    #[test]
    fn empty_stages_are_rejected() {
        let lines: [&[&str]; 3] = [&["|", "cat"], &["echo", "|"], &["echo", "|", "|", "cat"]];
        for line in lines {
            assert!(matches!(
                CommandLine::parse(tokens(line)),
                Err(ShellError::Syntax(_))
            ));
        }
    }

    #[test]
    fn empty_line() {
        assert_eq!(CommandLine::parse(Vec::new()).unwrap(), CommandLine::Empty);
    }

    #[test]
    fn pipe_descriptors_are_close_on_exec() {
        use nix::fcntl::{fcntl, FcntlArg, FdFlag};

        let pipe = Pipe::new().unwrap();
        for fd in [pipe.read_fd(), pipe.write_fd()] {
            let flags = FdFlag::from_bits_truncate(fcntl(fd, FcntlArg::F_GETFD).unwrap());
            assert!(flags.contains(FdFlag::FD_CLOEXEC));
        }
    }
}
