//! Candidate Generator
//!
//! Builds the prompt, makes the single bounded call to the text-generation
//! collaborator, and extracts the first SELECT. Every failure mode (timeout,
//! transport error, no SELECT in the response) is reported as absence.

pub mod extract;
pub mod prompt;

pub use extract::extract_first_select;
pub use prompt::build_prompt;

use crate::candidate::SqlCandidate;
use crate::intent::Intent;
use crate::llm::TextGenerator;
use crate::schema::SchemaDescriptor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct CandidateGenerator {
    llm: Arc<dyn TextGenerator>,
    schema: &'static SchemaDescriptor,
    timeout: Duration,
}

impl CandidateGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, schema: &'static SchemaDescriptor, timeout: Duration) -> Self {
        Self { llm, schema, timeout }
    }

    /// One attempt, no retries. `None` is an expected outcome.
    pub async fn generate(&self, question: &str, intent: &Intent) -> Option<SqlCandidate> {
        let prompt = build_prompt(question, intent, self.schema);
        debug!("Prompt for {} is {} chars", self.llm.name(), prompt.len());

        let response = match tokio::time::timeout(self.timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Text generation failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!("Text generation timed out after {:?}", self.timeout);
                return None;
            }
        };

        match extract_first_select(&response) {
            Some(sql) => {
                info!("Model proposed: {}", sql);
                Some(SqlCandidate::model_generated(sql))
            }
            None => {
                warn!("Model response contained no SELECT statement");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Provenance;
    use crate::error::{PipelineError, Result};
    use crate::intent::Metric;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("SELECT 1".to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(PipelineError::Llm("connection refused".to_string()))
        }
    }

    fn generator(llm: Arc<dyn TextGenerator>) -> CandidateGenerator {
        CandidateGenerator::new(llm, SchemaDescriptor::global(), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_extracts_model_candidate() {
        let g = generator(Arc::new(Canned("Here you go: SELECT a.item_id FROM ad_sales a;")));
        let candidate = g.generate("list items", &Intent::generic()).await.unwrap();
        assert_eq!(candidate.sql, "SELECT a.item_id FROM ad_sales a");
        assert_eq!(candidate.provenance, Provenance::ModelGenerated);
        assert!(!candidate.valid);
    }

    #[tokio::test]
    async fn test_timeout_is_absence() {
        let g = generator(Arc::new(Slow));
        assert!(g.generate("q", &Intent::new(Metric::Cpc, crate::intent::Aggregation::Row)).await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_is_absence() {
        assert!(generator(Arc::new(Broken)).generate("q", &Intent::generic()).await.is_none());
    }

    #[tokio::test]
    async fn test_response_without_select_is_absence() {
        let g = generator(Arc::new(Canned("I'm not sure what you mean.")));
        assert!(g.generate("q", &Intent::generic()).await.is_none());
    }
}
