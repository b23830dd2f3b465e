//! The classifier client.
//!
//! One operation: classify a target atom given its local context, returning
//! a classification and proposed relationships. The client owns the shared
//! rate limiter, the retry loop and response validation; the network itself
//! sits behind [`ChatTransport`] so the core owns no sockets and tests can
//! substitute canned responses.

pub mod http;
pub mod rate_limit;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ontology::Ontology;
use rate_limit::TokenBucket;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::warn;

/// System prompt template with `{{CONTEXT_JSON}}` and `{{TARGET_JSON}}`
/// slots.
const ATOM_PROMPT_TEMPLATE: &str = include_str!("prompts/atom_graph.md");

/// The fixed user message accompanying every request.
const USER_MESSAGE: &str = "Analyze the target atom according to the instructions in the system prompt.";

/// Classification given to an atom when every attempt failed. Never a
/// member of the taxonomy, so pruning drops the atom.
pub const ERROR_CLASS: &str = "Error";

/// An `{id, text}` pair as serialized into the prompt slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AtomRef {
    pub id: String,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A relationship proposed by the classifier, not yet checked against the
/// ontology.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedRelationship {
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub direction: Direction,
    pub justification: String,
}

/// The classifier's verdict for one atom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomAnalysis {
    pub classification: String,
    #[serde(default)]
    pub justification: Option<String>,
    pub relationships: Vec<ProposedRelationship>,
}

/// One chat-completion request as the transport sees it.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_message: String,
    pub temperature: f32,
}

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network failure: {0}")]
    Network(String),
    #[error("response carried no content")]
    Empty,
}

/// Blocking chat-completion transport. Implementations are expected to
/// enforce their own request timeout.
pub trait ChatTransport: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> std::result::Result<String, TransportError>;
}

/// The seam the graph constructor works against.
pub trait AtomClassifier: Send + Sync {
    fn process_atom(&self, target: &AtomRef, context: &[AtomRef]) -> Result<AtomAnalysis>;
}

pub struct ClassifierClient {
    transport: Box<dyn ChatTransport>,
    ontology: Arc<Ontology>,
    bucket: TokenBucket,
    retries: u32,
    backoff_factor: Duration,
}

impl ClassifierClient {
    pub fn new(transport: Box<dyn ChatTransport>, ontology: Arc<Ontology>, config: &Config) -> Self {
        Self {
            transport,
            ontology,
            bucket: TokenBucket::new(config.rate.tokens_per_second, config.rate.burst),
            retries: config.classifier.retries.max(1),
            backoff_factor: config.classifier.backoff_factor,
        }
    }

    fn render_prompt(&self, target: &AtomRef, context: &[AtomRef]) -> String {
        let context_json =
            serde_json::to_string_pretty(context).expect("atom refs serialize infallibly");
        let target_json =
            serde_json::to_string_pretty(target).expect("atom refs serialize infallibly");
        ATOM_PROMPT_TEMPLATE
            .replace("{{CONTEXT_JSON}}", &context_json)
            .replace("{{TARGET_JSON}}", &target_json)
    }

    /// Does the analysis respect the closed vocabularies? Target ids are
    /// not checked here; pruning handles dangling targets once the whole
    /// graph is known.
    fn conforms(&self, analysis: &AtomAnalysis) -> bool {
        self.ontology.is_valid_class(&analysis.classification)
            && analysis
                .relationships
                .iter()
                .all(|rel| self.ontology.has_relationship(&rel.kind))
    }

    fn fallback() -> AtomAnalysis {
        AtomAnalysis {
            classification: ERROR_CLASS.to_string(),
            justification: Some(
                "classifier call failed or returned an invalid response after all retries"
                    .to_string(),
            ),
            relationships: Vec::new(),
        }
    }
}

impl AtomClassifier for ClassifierClient {
    /// One token per call; transient failures (including HTTP 429) retry
    /// with exponential backoff, credential rejections abort the run, and
    /// exhaustion falls back to the error classification.
    fn process_atom(&self, target: &AtomRef, context: &[AtomRef]) -> Result<AtomAnalysis> {
        let request = ChatRequest {
            system_prompt: self.render_prompt(target, context),
            user_message: USER_MESSAGE.to_string(),
            temperature: 0.1,
        };

        self.bucket.acquire();

        for attempt in 0..self.retries {
            match self.transport.complete(&request) {
                Ok(body) => match serde_json::from_str::<serde_json::Value>(&body) {
                    Ok(value) => {
                        // Valid JSON of the wrong shape or vocabulary is a
                        // model error, not a transient fault; retrying the
                        // same prompt is not going to fix it.
                        return match serde_json::from_value::<AtomAnalysis>(value) {
                            Ok(analysis) if self.conforms(&analysis) => Ok(analysis),
                            Ok(analysis) => {
                                warn!(
                                    atom = %target.id,
                                    classification = %analysis.classification,
                                    "classifier response failed taxonomy validation"
                                );
                                Ok(Self::fallback())
                            }
                            Err(err) => {
                                warn!(atom = %target.id, %err, "classifier response has invalid shape");
                                Ok(Self::fallback())
                            }
                        };
                    }
                    Err(err) => {
                        warn!(
                            atom = %target.id,
                            attempt = attempt + 1,
                            %err,
                            "classifier returned non-JSON content"
                        );
                    }
                },
                Err(TransportError::Status { status: status @ (401 | 403), body }) => {
                    warn!(status, body = %body, "classifier rejected credentials");
                    return Err(Error::ClassifierAuth { status });
                }
                Err(err) => {
                    // A 429 lands here too and is treated like any other
                    // transient failure.
                    warn!(atom = %target.id, attempt = attempt + 1, %err, "classifier call failed");
                }
            }

            if attempt + 1 < self.retries {
                std::thread::sleep(self.backoff_factor * 2u32.pow(attempt));
            }
        }

        warn!(atom = %target.id, retries = self.retries, "classifier retries exhausted");
        Ok(Self::fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn test_ontology() -> Arc<Ontology> {
        Arc::new(Ontology::new(
            ["Claim".to_string(), "Evidence".to_string()],
            [(
                "supports".to_string(),
                vec!["Claim".to_string()],
                vec!["Evidence".to_string()],
            )],
        ))
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.rate.tokens_per_second = 1000.0;
        config.rate.burst = 1000.0;
        config.classifier.backoff_factor = Duration::from_millis(1);
        config
    }

    /// Transport returning scripted bodies, then repeating the last one.
    struct Script {
        responses: Mutex<Vec<std::result::Result<String, u16>>>,
        calls: Mutex<u32>,
    }

    impl Script {
        fn new(responses: Vec<std::result::Result<&str, u16>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl ChatTransport for Arc<Script> {
        fn complete(&self, request: &ChatRequest) -> std::result::Result<String, TransportError> {
            ChatTransport::complete(&**self, request)
        }
    }

    impl ChatTransport for Script {
        fn complete(&self, _request: &ChatRequest) -> std::result::Result<String, TransportError> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.pop().expect("non-empty")
            } else {
                responses.last().cloned().expect("non-empty")
            };
            next.map_err(|status| TransportError::Status {
                status,
                body: String::new(),
            })
        }
    }

    fn target() -> AtomRef {
        AtomRef {
            id: "chap0_par1_atom1".to_string(),
            text: "A claim.".to_string(),
        }
    }

    const GOOD: &str = r#"{
        "classification": "Claim",
        "justification": "states a thesis",
        "relationships": [
            { "target_id": "chap0_par1_atom2", "type": "supports",
              "direction": "outgoing", "justification": "backs it" }
        ]
    }"#;

    #[test]
    fn valid_response_passes_through() {
        let script = Script::new(vec![Ok(GOOD)]);
        let client = ClassifierClient::new(
            Box::new(script),
            test_ontology(),
            &fast_config(),
        );
        let analysis = client.process_atom(&target(), &[]).unwrap();
        assert_eq!(analysis.classification, "Claim");
        assert_eq!(analysis.relationships.len(), 1);
        assert_eq!(analysis.relationships[0].direction, Direction::Outgoing);
    }

    #[test]
    fn transient_failures_retry_then_succeed() {
        let script = Script::new(vec![Err(429), Ok("not json"), Ok(GOOD)]);
        let client =
            ClassifierClient::new(Box::new(script), test_ontology(), &fast_config());
        let analysis = client.process_atom(&target(), &[]).unwrap();
        assert_eq!(analysis.classification, "Claim");
    }

    #[test]
    fn exhausted_retries_fall_back_to_error_class() {
        let script = Script::new(vec![Err(500)]);
        let client =
            ClassifierClient::new(Box::new(script), test_ontology(), &fast_config());
        let analysis = client.process_atom(&target(), &[]).unwrap();
        assert_eq!(analysis.classification, ERROR_CLASS);
        assert!(analysis.relationships.is_empty());
    }

    #[test]
    fn retry_count_is_respected() {
        let script = Arc::new(Script::new(vec![Err(500)]));
        let client =
            ClassifierClient::new(Box::new(script.clone()), test_ontology(), &fast_config());
        let analysis = client.process_atom(&target(), &[]).unwrap();
        assert_eq!(analysis.classification, ERROR_CLASS);
        assert_eq!(script.calls(), 3);
    }

    #[test]
    fn invalid_classification_is_not_retried() {
        let wrong = r#"{ "classification": "Nonsense", "relationships": [] }"#;
        let script = Script::new(vec![Ok(wrong), Ok(GOOD)]);
        let client =
            ClassifierClient::new(Box::new(script), test_ontology(), &fast_config());
        let analysis = client.process_atom(&target(), &[]).unwrap();
        assert_eq!(analysis.classification, ERROR_CLASS);
    }

    #[test]
    fn auth_rejection_aborts() {
        let script = Script::new(vec![Err(401)]);
        let client =
            ClassifierClient::new(Box::new(script), test_ontology(), &fast_config());
        let err = client.process_atom(&target(), &[]).unwrap_err();
        assert!(matches!(err, Error::ClassifierAuth { status: 401 }));
    }

    #[test]
    fn prompt_carries_both_slots() {
        let client = ClassifierClient::new(
            Box::new(Script::new(vec![Ok(GOOD)])),
            test_ontology(),
            &fast_config(),
        );
        let context = vec![AtomRef {
            id: "chap0_par1_atom0".to_string(),
            text: "Earlier.".to_string(),
        }];
        let prompt = client.render_prompt(&target(), &context);
        assert!(prompt.contains("chap0_par1_atom1"));
        assert!(prompt.contains("Earlier."));
        assert!(!prompt.contains("{{CONTEXT_JSON}}"));
        assert!(!prompt.contains("{{TARGET_JSON}}"));
    }
}
