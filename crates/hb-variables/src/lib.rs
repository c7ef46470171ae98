//! HookBridge Variable Resolution
//!
//! Resolves `{{token}}` placeholders in free text against either a live
//! workflow execution's variable snapshot or an explicit caller-supplied
//! mapping. Unresolved tokens are left verbatim by policy: a partially
//! configured template stays readable instead of getting corrupted.

pub mod context;
pub mod engine;
pub mod error;
pub mod source;

pub use context::VariableContext;
pub use engine::{Resolution, VariableEngine, VariableEngineConfig};
pub use error::VariableError;
pub use source::{ExecutionContextSource, HttpExecutionContextSource, HttpExecutionContextSourceConfig, SourceError};

pub type Result<T> = std::result::Result<T, VariableError>;
