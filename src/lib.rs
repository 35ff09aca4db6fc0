pub mod cli;
pub mod shell;
pub mod utils;
