mod error;
pub mod executor;
mod readline;
#[allow(clippy::module_inception)]
mod shell;
mod signals;
pub mod tokenizer;

pub use error::{Result, ShellError};
pub use shell::Shell;
