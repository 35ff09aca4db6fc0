use log::warn;
use nix::sys::signal::{signal, SigHandler, Signal};

/// 交互模式下 shell 自己忽略 Ctrl-C / Ctrl-\，让前台子进程接收
pub fn ignore_interactive_signals() {
    for sig in [Signal::SIGINT, Signal::SIGQUIT] {
        // SAFETY: 只设置为 SIG_IGN，不安装自定义处理函数
        if let Err(e) = unsafe { signal(sig, SigHandler::SigIgn) } {
            warn!("无法忽略信号 {}: {}", sig, e);
        }
    }
}

/// 在子进程 exec 之前调用：被忽略的信号会跨 exec 继承，
/// Rust 运行时还会忽略 SIGPIPE
pub fn reset_for_child() {
    for sig in [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE] {
        // SAFETY: 恢复默认处理，在 fork 之后调用是安全的
        let _ = unsafe { signal(sig, SigHandler::SigDfl) };
    }
}
