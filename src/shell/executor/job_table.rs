use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::shell::error::{Result, ShellError};

/// 后台任务编号，从 1 开始单调递增，永不复用
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u32);

impl JobId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEntry {
    pub pid: Pid,
    /// 前台进程没有任务编号
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(Signal),
}

impl Termination {
    fn from_wait_status(status: WaitStatus) -> Option<(Pid, Self)> {
        match status {
            WaitStatus::Exited(pid, code) => Some((pid, Termination::Exited(code))),
            WaitStatus::Signaled(pid, sig, _core_dumped) => Some((pid, Termination::Signaled(sig))),
            _ => None,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Termination::Exited(0))
    }
}

/// 一个已经结束并被回收的子进程
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub pid: Pid,
    pub termination: Termination,
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.termination {
            Termination::Exited(0) => write!(f, "Child({}) exited -- success (0)", self.pid),
            Termination::Exited(code) => {
                write!(f, "Child({}) exited -- failure ({})", self.pid, code)
            }
            Termination::Signaled(sig) => write!(f, "Child({}) crashed ({})", self.pid, sig),
        }
    }
}

/// 子进程表：记录所有仍在运行（或尚未回收）的子进程
#[derive(Debug)]
pub struct JobTable {
    children: Vec<ChildEntry>,
    next_job_id: u32,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            next_job_id: 1,
        }
    }

    pub fn entries(&self) -> &[ChildEntry] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn track(&mut self, pid: Pid, background: bool) -> Option<JobId> {
        let job_id = if background {
            let id = JobId(self.next_job_id);
            self.next_job_id += 1;
            Some(id)
        } else {
            None
        };
        self.children.push(ChildEntry { pid, job_id });
        debug!("登记子进程 {} job_id={:?}", pid, job_id);
        job_id
    }

    pub fn untrack(&mut self, pid: Pid) -> Option<ChildEntry> {
        let pos = self.children.iter().position(|child| child.pid == pid)?;
        Some(self.children.remove(pos))
    }

    pub fn job_id_of(&self, pid: Pid) -> Option<JobId> {
        self.children
            .iter()
            .find(|child| child.pid == pid)
            .and_then(|child| child.job_id)
    }

    pub fn pid_of(&self, job_id: JobId) -> Option<Pid> {
        self.children
            .iter()
            .find(|child| child.job_id == Some(job_id))
            .map(|child| child.pid)
    }

    /// 非阻塞地回收所有已经结束的子进程
    pub fn reap_completed(&mut self) -> Vec<Completion> {
        // 遍历快照，回收过程中会修改 children
        let pids: Vec<Pid> = self.children.iter().map(|child| child.pid).collect();
        let mut completed = Vec::new();

        for pid in pids {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {}
                Ok(status) => {
                    if let Some((pid, termination)) = Termination::from_wait_status(status) {
                        self.untrack(pid);
                        completed.push(Completion { pid, termination });
                    }
                }
                Err(e) => {
                    debug!("waitpid({}) 失败: {}，不再跟踪", pid, e);
                    self.untrack(pid);
                }
            }
        }
        completed
    }

    /// 阻塞等待指定的子进程结束并将其移出进程表
    pub fn wait_for(&mut self, pid: Pid) -> Option<Completion> {
        let completion = wait_blocking(pid);
        self.untrack(pid);
        completion
    }

    /// 向所有子进程发送 SIGINT，然后等待它们全部结束；结束后进程表为空
    pub fn interrupt_all(&mut self) -> Vec<Completion> {
        for child in &self.children {
            if let Err(e) = kill(child.pid, Signal::SIGINT) {
                warn!("向 {} 发送 SIGINT 失败: {}", child.pid, e);
            }
        }

        let completed = self
            .children
            .iter()
            .filter_map(|child| wait_blocking(child.pid))
            .collect();
        self.children.clear();
        completed
    }

    pub fn interrupt_one(&self, job_id: JobId) -> Result<Pid> {
        let pid = self
            .pid_of(job_id)
            .ok_or(ShellError::JobNotFound(job_id))?;
        kill(pid, Signal::SIGINT).map_err(|source| ShellError::Signal {
            pid: pid.as_raw(),
            source,
        })?;
        Ok(pid)
    }
}

fn wait_blocking(pid: Pid) -> Option<Completion> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some((pid, termination)) = Termination::from_wait_status(status) {
                    return Some(Completion { pid, termination });
                }
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                debug!("waitpid({}) 失败: {}", pid, e);
                return None;
            }
        }
    }
}
