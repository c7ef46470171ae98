//! Webhook Processor
//!
//! The per-delivery state machine:
//!
//! ```text
//! Received -> (token invalid)                  -> Rejected
//! Received -> (identity seen in dedup window)  -> Duplicate
//! Received -> (token valid, new identity)      -> Dispatching -> Accepted
//! ```
//!
//! Whatever happens here, the HTTP boundary answers 200. The provider
//! redelivers on any non-2xx or timeout; a processing failure must never
//! look like a delivery failure or every bug becomes a redelivery storm.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use hb_common::{ProcessingResult, TenantId};
use hb_registry::TokenDirectory;

use crate::dedup::{DedupClaim, DedupOutcome, DedupStore};
use crate::dispatch::{DispatchError, WorkflowDispatcher};
use crate::event::InboundWebhookEvent;

/// How long a concurrent duplicate waits for the owning delivery to settle
/// before answering with what it has. Kept well under the provider's
/// response-time budget.
const SETTLE_BUDGET: Duration = Duration::from_secs(5);

pub struct WebhookProcessor {
    tokens: Arc<dyn TokenDirectory>,
    dedup: Arc<DedupStore>,
    dispatcher: Arc<dyn WorkflowDispatcher>,
}

impl WebhookProcessor {
    pub fn new(
        tokens: Arc<dyn TokenDirectory>,
        dedup: Arc<DedupStore>,
        dispatcher: Arc<dyn WorkflowDispatcher>,
    ) -> Self {
        Self {
            tokens,
            dedup,
            dispatcher,
        }
    }

    pub fn dedup(&self) -> &Arc<DedupStore> {
        &self.dedup
    }

    /// Process one inbound delivery through the state machine
    pub async fn process(&self, tenant_token: &str, payload: serde_json::Value) -> ProcessingResult {
        counter!("hookbridge_webhook_received").increment(1);

        // Step 1: obvious garbage never touches dedup state.
        if tenant_token.is_empty() {
            counter!("hookbridge_webhook_rejected").increment(1);
            return ProcessingResult::rejected("missing tenant token");
        }
        if payload.is_null() {
            counter!("hookbridge_webhook_rejected").increment(1);
            return ProcessingResult::rejected("empty payload");
        }

        let event = InboundWebhookEvent::new(tenant_token, payload);
        let identity = event.identity();

        // Step 2: atomic check-and-claim. Losers of a concurrent race wait
        // for the owner to settle so every delivery reports the same outcome.
        match self.dedup.claim(&identity) {
            DedupClaim::Fresh => {}
            DedupClaim::Seen { outcome, settled } => {
                counter!("hookbridge_webhook_duplicate").increment(1);
                let outcome = if outcome.is_settled() {
                    outcome
                } else {
                    DedupStore::await_settled(settled, SETTLE_BUDGET).await
                };
                info!(%identity, ?outcome, "duplicate delivery short-circuited");
                return duplicate_result(outcome);
            }
        }

        // This future is dropped whenever the provider hangs up mid-request.
        // The guard settles the claim as failed in that case, so a cancelled
        // delivery never shadows redeliveries for the retention window.
        let claim = self.dedup.guard(&identity);

        // Step 3: resolve the tenant. Failures are recorded so redeliveries
        // of the same broken event short-circuit too.
        let Some(tenant) = self.tokens.resolve(tenant_token) else {
            warn!(tenant_token, "webhook token did not resolve to a tenant");
            let detail = "unknown tenant token".to_string();
            claim.settle(DedupOutcome::Failed(detail.clone()));
            counter!("hookbridge_webhook_rejected").increment(1);
            return ProcessingResult::rejected(detail);
        };

        // Step 4: dispatch, with one bounded synchronous retry on transient
        // failure. Step 5: settle the claim before returning.
        match self.dispatch_with_retry(&tenant, &event).await {
            Ok(()) => {
                claim.settle(DedupOutcome::Succeeded);
                counter!("hookbridge_webhook_dispatched").increment(1);
                info!(tenant = %tenant, %identity, "webhook dispatched");
                ProcessingResult::accepted()
            }
            Err(e) => {
                let detail = e.to_string();
                claim.settle(DedupOutcome::Failed(detail.clone()));
                counter!("hookbridge_webhook_dispatch_failed").increment(1);
                error!(tenant = %tenant, %identity, error = %detail, "webhook dispatch failed");
                ProcessingResult::rejected(detail)
            }
        }
    }

    async fn dispatch_with_retry(
        &self,
        tenant: &TenantId,
        event: &InboundWebhookEvent,
    ) -> Result<(), DispatchError> {
        match self.dispatcher.dispatch(tenant, event).await {
            Err(DispatchError::Transient(first)) => {
                warn!(tenant = %tenant, error = %first, "transient dispatch failure, retrying once");
                self.dispatcher.dispatch(tenant, event).await
            }
            other => other,
        }
    }
}

fn duplicate_result(outcome: DedupOutcome) -> ProcessingResult {
    match outcome {
        DedupOutcome::Succeeded => ProcessingResult::duplicate(true, "duplicate delivery"),
        DedupOutcome::Failed(reason) => {
            ProcessingResult::duplicate(false, format!("duplicate delivery; prior failure: {reason}"))
        }
        DedupOutcome::Pending => {
            ProcessingResult::duplicate(false, "duplicate delivery still processing")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupStoreConfig;
    use async_trait::async_trait;
    use hb_common::ProcessingState;
    use hb_registry::InMemoryTokenDirectory;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Dispatcher that counts calls and fails according to a script
    struct ScriptedDispatcher {
        calls: AtomicUsize,
        script: Mutex<Vec<Result<(), DispatchError>>>,
        delay: Option<Duration>,
    }

    impl ScriptedDispatcher {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        fn scripted(script: Vec<Result<(), DispatchError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
                delay: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(Vec::new()),
                delay: Some(delay),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WorkflowDispatcher for ScriptedDispatcher {
        async fn dispatch(
            &self,
            _tenant: &TenantId,
            _event: &InboundWebhookEvent,
        ) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut script = self.script.lock();
            if script.is_empty() {
                Ok(())
            } else {
                script.remove(0)
            }
        }
    }

    fn processor_with(dispatcher: Arc<ScriptedDispatcher>) -> WebhookProcessor {
        let tokens = Arc::new(InMemoryTokenDirectory::new());
        tokens.register("tok-1", TenantId::from("t1"));
        WebhookProcessor::new(
            tokens,
            Arc::new(DedupStore::new(DedupStoreConfig::default())),
            dispatcher,
        )
    }

    fn payload(id: &str) -> serde_json::Value {
        json!({
            "entry": [{
                "changes": [{
                    "value": {"messages": [{"id": id}]}
                }]
            }]
        })
    }

    #[tokio::test]
    async fn valid_delivery_is_accepted() {
        let dispatcher = Arc::new(ScriptedDispatcher::succeeding());
        let processor = processor_with(dispatcher.clone());

        let result = processor.process("tok-1", payload("wamid.1")).await;
        assert_eq!(result.state, ProcessingState::Accepted);
        assert!(result.success);
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn empty_token_rejected_without_dedup_state() {
        let dispatcher = Arc::new(ScriptedDispatcher::succeeding());
        let processor = processor_with(dispatcher.clone());

        let result = processor.process("", payload("wamid.1")).await;
        assert_eq!(result.state, ProcessingState::Rejected);
        assert!(processor.dedup().is_empty());
        assert_eq!(dispatcher.calls(), 0);
    }

    #[tokio::test]
    async fn null_payload_rejected_without_dedup_state() {
        let dispatcher = Arc::new(ScriptedDispatcher::succeeding());
        let processor = processor_with(dispatcher.clone());

        let result = processor.process("tok-1", serde_json::Value::Null).await;
        assert_eq!(result.state, ProcessingState::Rejected);
        assert!(processor.dedup().is_empty());
    }

    #[tokio::test]
    async fn unknown_token_records_rejection() {
        let dispatcher = Arc::new(ScriptedDispatcher::succeeding());
        let processor = processor_with(dispatcher.clone());

        let result = processor.process("tok-unknown", payload("wamid.1")).await;
        assert_eq!(result.state, ProcessingState::Rejected);
        assert!(!result.success);
        assert_eq!(dispatcher.calls(), 0);

        // Redelivery of the same broken event short-circuits as a duplicate.
        let again = processor.process("tok-unknown", payload("wamid.1")).await;
        assert_eq!(again.state, ProcessingState::Duplicate);
        assert!(!again.success);
    }

    #[tokio::test]
    async fn redelivery_does_not_redispatch() {
        let dispatcher = Arc::new(ScriptedDispatcher::succeeding());
        let processor = processor_with(dispatcher.clone());

        let first = processor.process("tok-1", payload("wamid.1")).await;
        assert!(first.success);

        let second = processor.process("tok-1", payload("wamid.1")).await;
        assert_eq!(second.state, ProcessingState::Duplicate);
        assert!(second.success, "duplicate reports the prior outcome");
        assert_eq!(dispatcher.calls(), 1, "dispatch side effect exactly once");
    }

    #[tokio::test]
    async fn transient_failure_retried_exactly_once() {
        let dispatcher = Arc::new(ScriptedDispatcher::scripted(vec![
            Err(DispatchError::Transient("engine busy".into())),
            Ok(()),
        ]));
        let processor = processor_with(dispatcher.clone());

        let result = processor.process("tok-1", payload("wamid.1")).await;
        assert!(result.success);
        assert_eq!(dispatcher.calls(), 2);
    }

    #[tokio::test]
    async fn transient_failure_twice_gives_up() {
        let dispatcher = Arc::new(ScriptedDispatcher::scripted(vec![
            Err(DispatchError::Transient("engine busy".into())),
            Err(DispatchError::Transient("engine busy".into())),
        ]));
        let processor = processor_with(dispatcher.clone());

        let result = processor.process("tok-1", payload("wamid.1")).await;
        assert!(!result.success);
        assert_eq!(dispatcher.calls(), 2, "one retry, no more");
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let dispatcher = Arc::new(ScriptedDispatcher::scripted(vec![Err(
            DispatchError::Permanent("bad trigger".into()),
        )]));
        let processor = processor_with(dispatcher.clone());

        let result = processor.process("tok-1", payload("wamid.1")).await;
        assert!(!result.success);
        assert_eq!(dispatcher.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_delivery_does_not_wedge_redeliveries() {
        let dispatcher = Arc::new(ScriptedDispatcher::slow(Duration::from_millis(500)));
        let processor = Arc::new(processor_with(dispatcher.clone()));

        let owner = tokio::spawn({
            let processor = Arc::clone(&processor);
            async move { processor.process("tok-1", payload("wamid.gone")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        owner.abort();
        assert!(owner.await.unwrap_err().is_cancelled());

        // The redelivery sees a settled failure, not a claim stuck pending.
        let redelivery = processor.process("tok-1", payload("wamid.gone")).await;
        assert_eq!(redelivery.state, ProcessingState::Duplicate);
        assert!(!redelivery.success);
        assert!(redelivery.detail.unwrap().contains("cancelled"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deliveries_dispatch_once_and_agree() {
        let dispatcher = Arc::new(ScriptedDispatcher::slow(Duration::from_millis(50)));
        let processor = Arc::new(processor_with(dispatcher.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let processor = Arc::clone(&processor);
            handles.push(tokio::spawn(async move {
                processor.process("tok-1", payload("wamid.race")).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(dispatcher.calls(), 1, "exactly one dispatch");
        assert!(results.iter().all(|r| r.success), "all agree on the outcome");
        let accepted = results
            .iter()
            .filter(|r| r.state == ProcessingState::Accepted)
            .count();
        assert_eq!(accepted, 1);
        assert!(results
            .iter()
            .filter(|r| r.state == ProcessingState::Duplicate)
            .all(|r| r.success));
    }
}
