mod builtins;
#[allow(clippy::module_inception)]
mod executor;
mod expand;
mod job_table;
mod launcher;
mod pipeline;
mod variable;

pub use builtins::Builtin;
pub use executor::{Executor, Outcome};
pub use expand::Expander;
pub use job_table::{ChildEntry, Completion, JobId, JobTable, Termination};
pub use launcher::{Launched, Stage, StageLauncher, EXIT_EXEC_FAILED};
pub use pipeline::{CommandLine, Pipe, Pipeline};
pub use variable::VariableStore;
