//! Variable Resolution Engine

use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use hb_common::VariableValue;

use crate::context::VariableContext;
use crate::error::VariableError;
use crate::source::ExecutionContextSource;
use crate::Result;

/// `{{ name }}` with optional inner whitespace; names are identifier-like
/// with dotted segments allowed
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
            .expect("token pattern is valid")
    })
}

#[derive(Debug, Clone)]
pub struct VariableEngineConfig {
    /// Bound on the execution-snapshot lookup. The webhook response path
    /// sits on top of this call and has its own budget with the provider.
    pub lookup_timeout: Duration,
}

impl Default for VariableEngineConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(3),
        }
    }
}

/// Outcome of a resolution, including which tokens could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    /// Token names left verbatim in the output, in order of first
    /// appearance, deduplicated
    pub unresolved: Vec<String>,
}

pub struct VariableEngine {
    source: Arc<dyn ExecutionContextSource>,
    config: VariableEngineConfig,
}

impl VariableEngine {
    pub fn new(source: Arc<dyn ExecutionContextSource>, config: VariableEngineConfig) -> Self {
        Self { source, config }
    }

    /// Resolve placeholders in `template` against `context`.
    ///
    /// Unresolved tokens are left verbatim. Resolution against an unchanged
    /// context is idempotent: values render in one canonical form per type.
    pub async fn resolve(&self, template: &str, context: &VariableContext) -> Result<String> {
        Ok(self.resolve_report(template, context).await?.text)
    }

    /// Like `resolve`, additionally reporting the unresolved token names so
    /// callers can surface partial resolution
    pub async fn resolve_report(
        &self,
        template: &str,
        context: &VariableContext,
    ) -> Result<Resolution> {
        if template.is_empty() {
            return Err(VariableError::EmptyTemplate);
        }

        match context {
            VariableContext::Explicit(map) => Ok(substitute(template, map)),
            VariableContext::Execution(execution_id) => {
                let snapshot = self.fetch_snapshot(execution_id).await?;
                Ok(substitute(template, &snapshot))
            }
        }
    }

    /// Snapshot lookup under the configured timeout. A timeout or transport
    /// failure is reported as UnknownExecution rather than hanging or
    /// half-substituting.
    async fn fetch_snapshot(&self, execution_id: &str) -> Result<BTreeMap<String, VariableValue>> {
        let lookup = self.source.snapshot(execution_id);
        match tokio::time::timeout(self.config.lookup_timeout, lookup).await {
            Ok(Ok(Some(snapshot))) => {
                debug!(execution_id, variables = snapshot.len(), "snapshot resolved");
                Ok(snapshot)
            }
            Ok(Ok(None)) => Err(VariableError::unknown_execution(execution_id)),
            Ok(Err(e)) => {
                warn!(execution_id, error = %e, "execution snapshot lookup failed");
                Err(VariableError::unknown_execution(execution_id))
            }
            Err(_) => {
                warn!(execution_id, "execution snapshot lookup timed out");
                Err(VariableError::unknown_execution(execution_id))
            }
        }
    }
}

/// Pure text transform: replace known tokens, keep unknown ones verbatim
fn substitute(template: &str, values: &BTreeMap<String, VariableValue>) -> Resolution {
    let mut unresolved: Vec<String> = Vec::new();
    let text = token_pattern().replace_all(template, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match values.get(name) {
            Some(value) => Cow::Owned(value.render()),
            None => {
                if !unresolved.iter().any(|n| n == name) {
                    unresolved.push(name.to_string());
                }
                Cow::Owned(caps[0].to_string())
            }
        }
    });

    Resolution {
        text: text.into_owned(),
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct MapSource {
        executions: BTreeMap<String, BTreeMap<String, VariableValue>>,
        delay: Option<Duration>,
    }

    impl MapSource {
        fn empty() -> Self {
            Self {
                executions: BTreeMap::new(),
                delay: None,
            }
        }

        fn with(execution_id: &str, values: BTreeMap<String, VariableValue>) -> Self {
            Self {
                executions: BTreeMap::from([(execution_id.to_string(), values)]),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl ExecutionContextSource for MapSource {
        async fn snapshot(
            &self,
            execution_id: &str,
        ) -> std::result::Result<Option<BTreeMap<String, VariableValue>>, SourceError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.executions.get(execution_id).cloned())
        }
    }

    fn engine(source: MapSource) -> VariableEngine {
        VariableEngine::new(Arc::new(source), VariableEngineConfig::default())
    }

    fn ada() -> VariableContext {
        VariableContext::explicit(BTreeMap::from([(
            "name".to_string(),
            VariableValue::from("Ada"),
        )]))
    }

    #[tokio::test]
    async fn resolves_known_token() {
        let engine = engine(MapSource::empty());
        let text = engine.resolve("Hello {{name}}", &ada()).await.unwrap();
        assert_eq!(text, "Hello Ada");
    }

    #[tokio::test]
    async fn unknown_token_left_verbatim() {
        let engine = engine(MapSource::empty());
        let text = engine.resolve("Hello {{missing}}", &ada()).await.unwrap();
        assert_eq!(text, "Hello {{missing}}");
    }

    #[tokio::test]
    async fn inner_whitespace_is_tolerated() {
        let engine = engine(MapSource::empty());
        let text = engine.resolve("Hello {{ name }}", &ada()).await.unwrap();
        assert_eq!(text, "Hello Ada");
    }

    #[tokio::test]
    async fn empty_template_is_an_error() {
        let engine = engine(MapSource::empty());
        let err = engine.resolve("", &ada()).await.unwrap_err();
        assert!(matches!(err, VariableError::EmptyTemplate));
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let engine = engine(MapSource::empty());
        let context = VariableContext::explicit(BTreeMap::from([
            ("n".to_string(), VariableValue::Number(1234567.0)),
            ("ok".to_string(), VariableValue::Flag(true)),
            (
                "at".to_string(),
                VariableValue::Timestamp(
                    chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                ),
            ),
        ]));

        let template = "{{n}} {{ok}} {{at}} {{missing}}";
        let first = engine.resolve(template, &context).await.unwrap();
        let second = engine.resolve(template, &context).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "1234567 true 2024-03-01T12:00:00Z {{missing}}");
    }

    #[tokio::test]
    async fn report_lists_unresolved_in_order_without_duplicates() {
        let engine = engine(MapSource::empty());
        let resolution = engine
            .resolve_report("{{b}} {{a}} {{b}} {{name}}", &ada())
            .await
            .unwrap();
        assert_eq!(resolution.unresolved, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(resolution.text, "{{b}} {{a}} {{b}} Ada");
    }

    #[tokio::test]
    async fn execution_context_resolves_from_snapshot() {
        let values = BTreeMap::from([("order.id".to_string(), VariableValue::from("A-17"))]);
        let engine = engine(MapSource::with("exec-1", values));

        let text = engine
            .resolve("Order {{order.id}}", &VariableContext::execution("exec-1"))
            .await
            .unwrap();
        assert_eq!(text, "Order A-17");
    }

    #[tokio::test]
    async fn unknown_execution_errors_instead_of_blanking() {
        let engine = engine(MapSource::empty());
        let err = engine
            .resolve("Hello {{name}}", &VariableContext::execution("exec-gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, VariableError::UnknownExecution { .. }));
    }

    #[tokio::test]
    async fn slow_lookup_is_treated_as_unknown_execution() {
        let mut source = MapSource::with("exec-1", BTreeMap::new());
        source.delay = Some(Duration::from_millis(200));
        let engine = VariableEngine::new(
            Arc::new(source),
            VariableEngineConfig {
                lookup_timeout: Duration::from_millis(20),
            },
        );

        let err = engine
            .resolve("Hi {{name}}", &VariableContext::execution("exec-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, VariableError::UnknownExecution { .. }));
    }
}
