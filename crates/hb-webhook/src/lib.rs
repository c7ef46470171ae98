//! HookBridge Webhook Pipeline
//!
//! This crate provides:
//! - WebhookVerifier: handshake and payload-signature verification against
//!   tenant-configured secrets (fails closed)
//! - WebhookProcessor: the per-delivery state machine with redelivery
//!   deduplication and workflow dispatch
//! - DedupStore: windowed, atomically claimed delivery identities
//! - WorkflowDispatcher: delivery to the workflow engine (HTTP impl + trait)

pub mod dedup;
pub mod dispatch;
pub mod event;
pub mod processor;
pub mod verifier;

pub use dedup::{ClaimGuard, DedupClaim, DedupOutcome, DedupStore, DedupStoreConfig};
pub use dispatch::{DispatchError, HttpWorkflowDispatcher, HttpWorkflowDispatcherConfig, WorkflowDispatcher};
pub use event::{EventIdentity, InboundWebhookEvent};
pub use processor::WebhookProcessor;
pub use verifier::WebhookVerifier;
