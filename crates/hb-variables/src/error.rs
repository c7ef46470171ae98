//! Variable Resolution Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VariableError {
    /// Callers must guard empty templates; resolving one is a precondition
    /// error, not a silent no-op
    #[error("Template is empty")]
    EmptyTemplate,

    /// The execution id names no running/known execution. Lookup timeouts
    /// land here too rather than hanging the caller.
    #[error("Unknown execution: {execution_id}")]
    UnknownExecution { execution_id: String },
}

impl VariableError {
    pub fn unknown_execution(execution_id: impl Into<String>) -> Self {
        Self::UnknownExecution {
            execution_id: execution_id.into(),
        }
    }
}
