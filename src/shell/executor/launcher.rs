use std::ffi::CString;
use std::io::Write;

use log::{debug, trace};
use nix::errno::Errno;
use nix::unistd::{self, fork, ForkResult, Pid};

use crate::shell::error::{Result, ShellError};
use crate::shell::signals;

use super::builtins::{self, Builtin};
use super::job_table::JobTable;
use super::pipeline::Pipe;
use super::Outcome;

/// 找不到可执行文件时子进程的退出码，和程序自身的失败区分开
pub const EXIT_EXEC_FAILED: i32 = 127;
const EXIT_REDIRECT_FAILED: i32 = 126;

/// 管道中的一段
pub struct Stage<'a> {
    pub argv: &'a [String],
    pub background: bool,
    pub read: Option<&'a Pipe>,
    pub write: Option<&'a Pipe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launched {
    /// 在当前进程内完成（内建命令或启动前就失败）
    Inline(Outcome),
    Process(Pid),
}

pub struct StageLauncher<'a> {
    pub(super) jobs: &'a mut JobTable,
    pub(super) out: &'a mut dyn Write,
    pub(super) diag: &'a mut dyn Write,
    /// 执行过 `exit` 后，管道中剩余的段不再启动
    pub(super) exit_requested: bool,
}

impl<'a> StageLauncher<'a> {
    pub fn new(jobs: &'a mut JobTable, out: &'a mut dyn Write, diag: &'a mut dyn Write) -> Self {
        Self {
            jobs,
            out,
            diag,
            exit_requested: false,
        }
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// 内建命令直接在当前进程执行；外部命令 fork 后登记到进程表。
    ///
    /// 前台进程不在这里等待，由调用方在整条管道启动后调用 `wait_foreground`。
    pub fn launch(&mut self, stage: &Stage<'_>) -> Result<Launched> {
        debug!(" + {}", shell_words::join(stage.argv));

        let Some(name) = stage.argv.first() else {
            return Err(ShellError::Syntax("empty command".to_string()));
        };

        // 处理内建命令
        if let Some(builtin) = Builtin::from_name(name) {
            debug!("执行内建命令: {}", builtin.name());
            return match builtins::run(builtin, &stage.argv[1..], self) {
                Ok(()) => Ok(Launched::Inline(Outcome::Success)),
                Err(e) => {
                    writeln!(self.diag, "{}: {}", builtin.name(), e)?;
                    Ok(Launched::Inline(Outcome::Failure))
                }
            };
        }

        let program = match ExecPlan::new(stage.argv) {
            Ok(program) => program,
            Err(e) => {
                writeln!(self.diag, "{}", e)?;
                return Ok(Launched::Inline(Outcome::Failure));
            }
        };

        debug!(
            "readPipe: {} writePipe: {}",
            stage.read.map_or("-1,-1".to_string(), Pipe::to_string),
            stage.write.map_or("-1,-1".to_string(), Pipe::to_string),
        );

        // fork 之前刷新缓冲区，保证输出顺序
        self.out.flush()?;
        self.diag.flush()?;

        // SAFETY: 子进程只做描述符重定向和 exec，需要的内存都在 fork 之前分配好
        match unsafe { fork() } {
            Err(e) => Err(ShellError::Fork(e)),
            Ok(ForkResult::Child) => exec_child(&program, stage.read, stage.write),
            Ok(ForkResult::Parent { child }) => {
                let job_id = self.jobs.track(child, stage.background);
                if let Some(job_id) = job_id {
                    writeln!(self.diag, "[{}] background process {}", job_id, child)?;
                }
                Ok(Launched::Process(child))
            }
        }
    }

    /// 阻塞等待一个前台子进程并报告其结果
    pub fn wait_foreground(&mut self, pid: Pid) -> Result<()> {
        trace!("等待前台进程 {}", pid);
        match self.jobs.wait_for(pid) {
            Some(completion) => writeln!(self.diag, "{}", completion)?,
            None => debug!("进程 {} 已经被回收", pid),
        }
        Ok(())
    }
}

/// fork 之前准备好的 exec 参数
struct ExecPlan {
    argv: Vec<CString>,
    /// 名字中不含 '/' 时，PATH 查找失败后再尝试 ./name
    local_fallback: Option<CString>,
    failure_prefix: String,
}

impl ExecPlan {
    fn new(argv: &[String]) -> Result<Self> {
        let argv = argv
            .iter()
            .map(|arg| {
                CString::new(arg.as_bytes()).map_err(|_| {
                    ShellError::InvalidArgument(format!("argument contains a NUL byte: {:?}", arg))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let Some(name) = argv.first() else {
            return Err(ShellError::Syntax("empty command".to_string()));
        };

        let local_fallback = if name.as_bytes().contains(&b'/') {
            None
        } else {
            let mut local = b"./".to_vec();
            local.extend_from_slice(name.as_bytes());
            CString::new(local).ok()
        };
        let failure_prefix = format!("Failed to exec command '{}' : ", name.to_string_lossy());

        Ok(Self {
            argv,
            local_fallback,
            failure_prefix,
        })
    }
}

/// 只在 fork 出来的子进程中调用，永不返回
fn exec_child(program: &ExecPlan, read: Option<&Pipe>, write: Option<&Pipe>) -> ! {
    signals::reset_for_child();

    if let Some(pipe) = read {
        if let Err(e) = redirect(pipe.read_fd(), libc::STDIN_FILENO, pipe) {
            child_exit(b"Failed to redirect stdin to pipe : ", e, EXIT_REDIRECT_FAILED);
        }
    }
    if let Some(pipe) = write {
        if let Err(e) = redirect(pipe.write_fd(), libc::STDOUT_FILENO, pipe) {
            child_exit(b"Failed to redirect stdout to pipe : ", e, EXIT_REDIRECT_FAILED);
        }
    }

    let Some(name) = program.argv.first() else {
        exit_now(EXIT_EXEC_FAILED);
    };
    let mut errno = exec_error(unistd::execvp(name, &program.argv));
    if let Some(local) = &program.local_fallback {
        let local_errno = exec_error(unistd::execv(local, &program.argv));
        // 本地文件存在但无法执行时报告这个错误
        if local_errno != Errno::ENOENT {
            errno = local_errno;
        }
    }
    child_exit(program.failure_prefix.as_bytes(), errno, EXIT_EXEC_FAILED)
}

fn exec_error(result: nix::Result<std::convert::Infallible>) -> Errno {
    match result {
        Err(e) => e,
        Ok(never) => match never {},
    }
}

/// 把 fd 复制到 target 上，然后关闭管道原来的两端
fn redirect(fd: libc::c_int, target: libc::c_int, pipe: &Pipe) -> nix::Result<()> {
    unistd::dup2(fd, target)?;
    // 父进程中的 OwnedFd 不受影响；子进程不会运行析构函数
    unistd::close(pipe.read_fd())?;
    unistd::close(pipe.write_fd())?;
    Ok(())
}

fn child_exit(prefix: &[u8], errno: Errno, code: i32) -> ! {
    write_stderr(prefix);
    write_stderr(errno.desc().as_bytes());
    write_stderr(b"\n");
    exit_now(code)
}

fn exit_now(code: i32) -> ! {
    // SAFETY: 不运行 atexit 处理函数，也不刷新从父进程复制来的 stdio 缓冲区
    unsafe { libc::_exit(code) }
}

fn write_stderr(bytes: &[u8]) {
    // SAFETY: 直接写 fd 2，不经过 std 的锁
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            bytes.as_ptr() as *const libc::c_void,
            bytes.len(),
        );
    }
}
