//! HookBridge Provider Registry
//!
//! This crate provides:
//! - ProviderCatalog: immutable catalog of integration provider definitions,
//!   built once at process start
//! - ProviderRegistry: validated per-tenant settings over a SettingsStore
//! - TokenDirectory: webhook tenant-token to tenant resolution

pub mod catalog;
pub mod error;
pub mod settings;
pub mod tokens;

pub use catalog::{FieldSpec, ProviderCatalog, ProviderCategory, ProviderDefinition, MESSAGING_PROVIDER_KEY};
pub use error::RegistryError;
pub use settings::{InMemorySettingsStore, ProviderRegistry, SettingsStore, TenantProviderSetting};
pub use tokens::{InMemoryTokenDirectory, TokenDirectory};

pub type Result<T> = std::result::Result<T, RegistryError>;
