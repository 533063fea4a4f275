//! Query Pipeline
//!
//! Orchestrates one question end to end: classify, ask the model, validate,
//! repair, execute, and fall back (model → template → safe) whenever a stage
//! fails. Only an empty question, bad configuration, or a database that cannot
//! run even the safe fallback ever reaches the caller as an error.

pub mod error_classifier;
pub mod stages;

pub use error_classifier::{DbErrorClass, ErrorClassifier};
pub use stages::FallbackReason;

use crate::candidate::{Provenance, SqlCandidate};
use crate::config::PipelineConfig;
use crate::db;
use crate::error::{DbError, ExecutionError, PipelineError, Result};
use crate::execution::{Database, ExecutionCoordinator, QueryResult, SqliteDatabase};
use crate::fallback::{safe_fallback, TemplateFallback};
use crate::generation::CandidateGenerator;
use crate::intent::{classify, Intent};
use crate::llm::{LlmClient, TextGenerator};
use crate::rewriter::SqlRewriter;
use crate::schema::SchemaDescriptor;
use crate::validation::SqlValidator;
use serde::Serialize;
use stages::Stage;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Everything a result consumer needs to display and audit an answer.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub request_id: Uuid,
    pub question: String,
    pub intent: Intent,
    /// The statement that produced `result`
    pub candidate: SqlCandidate,
    pub result: QueryResult,
    /// Downgrades taken on the way, oldest first
    pub trail: Vec<FallbackReason>,
}

impl Answer {
    pub fn provenance(&self) -> Provenance {
        self.candidate.provenance
    }
}

pub struct QueryPipeline {
    schema: &'static SchemaDescriptor,
    generator: Option<CandidateGenerator>,
    validator: SqlValidator,
    rewriter: SqlRewriter,
    templates: TemplateFallback,
    coordinator: ExecutionCoordinator,
    classifier: ErrorClassifier,
}

impl QueryPipeline {
    pub fn new(llm: Arc<dyn TextGenerator>, db: Arc<dyn Database>, config: &PipelineConfig) -> Self {
        let schema = SchemaDescriptor::global();
        let mut pipeline = Self::without_generator(db, config);
        pipeline.generator = Some(CandidateGenerator::new(llm, schema, config.llm_timeout));
        pipeline
    }

    /// Template-only pipeline; never touches the network.
    pub fn without_generator(db: Arc<dyn Database>, config: &PipelineConfig) -> Self {
        let schema = SchemaDescriptor::global();
        Self {
            schema,
            generator: None,
            validator: SqlValidator::new(schema),
            rewriter: SqlRewriter::new(schema),
            templates: TemplateFallback::new(schema, config.row_limit),
            coordinator: ExecutionCoordinator::new(db, config.query_timeout),
            classifier: ErrorClassifier::new(),
        }
    }

    /// Open the pool and, when an API key is configured, the model client.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        let pool = db::init_pool(
            &config.database_url,
            config.db_max_connections,
            config.db_acquire_timeout,
        )
        .await
        .map_err(|e| ExecutionError {
            engine: "sqlite".to_string(),
            sql: "SELECT 1".to_string(),
            source: DbError::Sqlx(e),
        })?;
        info!("Connected to {}", config.database_url);
        let database: Arc<dyn Database> = Arc::new(SqliteDatabase::from_pool(pool));

        Ok(match &config.api_key {
            Some(key) => {
                let llm = LlmClient::new(key.clone(), config.model.clone(), config.base_url.clone())
                    .with_timeout(config.llm_timeout);
                Self::new(Arc::new(llm), database, config)
            }
            None => {
                warn!("No API key configured; answering from templates only");
                Self::without_generator(database, config)
            }
        })
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let request_id = Uuid::new_v4();
        let span = info_span!("answer", request_id = %request_id);
        self.run(request_id, question).instrument(span).await
    }

    async fn run(&self, request_id: Uuid, question: &str) -> Result<Answer> {
        let intent = classify(question, self.schema);
        info!(
            "Intent: {} {:?} limit={:?} filters={}",
            intent.metric,
            intent.aggregation,
            intent.limit,
            intent.filters.len()
        );

        let mut trail = Vec::new();
        let mut stage = if self.generator.is_some() {
            Stage::Model
        } else {
            Stage::Template
        };

        loop {
            stage = match stage {
                Stage::Model => match self.model_candidate(question, &intent).await {
                    Ok(candidate) => Stage::Execute(candidate),
                    Err(e) => {
                        warn!("Falling back to template: {}", e);
                        trail.push(FallbackReason::from(e));
                        Stage::Template
                    }
                },
                Stage::Template => {
                    let candidate = self.templates.template_for(&intent);
                    info!("Using template SQL");
                    Stage::Execute(candidate)
                }
                Stage::Execute(candidate) => match self.coordinator.execute(&candidate).await {
                    Ok(result) => {
                        info!(
                            "Answered with {} SQL ({} {}, {} ms)",
                            candidate.provenance,
                            result.row_count,
                            result.shape(),
                            result.elapsed_ms
                        );
                        return Ok(Answer {
                            request_id,
                            question: question.to_string(),
                            intent,
                            candidate,
                            result,
                            trail,
                        });
                    }
                    Err(e) => {
                        let class = self.classifier.classify(&e.source);
                        warn!("{} SQL failed ({}): {}", candidate.provenance, class, e);
                        trail.push(FallbackReason::ExecutionFailed {
                            provenance: candidate.provenance,
                            class,
                            detail: e.source.to_string(),
                        });
                        match candidate.provenance {
                            Provenance::ModelGenerated => Stage::Template,
                            Provenance::Template | Provenance::SafeFallback => Stage::Safe(e),
                        }
                    }
                },
                Stage::Safe(primary) => {
                    let candidate = safe_fallback();
                    info!("Using safe fallback SQL");
                    match self.coordinator.execute(&candidate).await {
                        Ok(result) => {
                            return Ok(Answer {
                                request_id,
                                question: question.to_string(),
                                intent,
                                candidate,
                                result,
                                trail,
                            })
                        }
                        Err(fallback) => {
                            error!(
                                "Database unavailable ({}): {}",
                                self.classifier.classify(&fallback.source),
                                fallback
                            );
                            return Err(PipelineError::DatabaseUnavailable {
                                primary: Box::new(primary),
                                fallback: Box::new(fallback),
                            });
                        }
                    }
                }
            };
        }
    }

    /// Generate, validate, repair and re-validate the model's statement. Any
    /// error here is recovered by the template.
    async fn model_candidate(&self, question: &str, intent: &Intent) -> Result<SqlCandidate> {
        let generator = self.generator.as_ref().ok_or(PipelineError::GenerationAbsent)?;
        let candidate = generator
            .generate(question, intent)
            .await
            .ok_or(PipelineError::GenerationAbsent)?;

        let report = self.validator.validate(&candidate, intent);
        if report.has_structural_violation() {
            return Err(PipelineError::ValidationFailed(report.violations));
        }

        let repaired = self.rewriter.repair(&candidate)?;
        let report = self.validator.validate(&repaired, intent);
        if !report.is_valid() {
            return Err(PipelineError::ValidationFailed(report.violations));
        }
        Ok(repaired.mark_valid())
    }
}
