pub mod actions;
pub mod condition;
pub mod context;
pub mod control;
pub mod execution;
pub mod scheduler;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use actions::*;
pub use condition::*;
pub use context::*;
pub use control::*;
pub use execution::*;
pub use scheduler::*;
pub use types::*;
