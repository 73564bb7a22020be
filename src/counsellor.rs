//! Submit-for-analysis orchestration and attempt history.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisResult;
use crate::assessment::ResponseSet;
use crate::catalog;
use crate::cohere::{GenerateRequest, TextGenerator};
use crate::config::GenerationConfig;
use crate::error::{CounsellorError, StorageError, StorageResult};
use crate::prompts;
use crate::storage::{AssessmentAttempt, Storage, User};

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    /// The analysis returned by the model.
    pub analysis: AnalysisResult,
    /// Id of the saved attempt, when one was saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    /// Whether the attempt was saved. False when the write failed.
    pub saved: bool,
}

/// An analysis together with the responses it was produced from.
///
/// This is the context of the assessment chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedAnalysis {
    /// Submitted responses.
    pub responses: ResponseSet,
    /// Their analysis.
    pub analysis: AnalysisResult,
}

impl From<AssessmentAttempt> for CompletedAnalysis {
    fn from(attempt: AssessmentAttempt) -> Self {
        Self {
            responses: attempt.responses,
            analysis: attempt.analysis,
        }
    }
}

/// Analysis service over the generator and attempt storage.
#[derive(Clone)]
pub struct Counsellor {
    storage: Arc<dyn Storage>,
    generator: Arc<dyn TextGenerator>,
    generation: GenerationConfig,
    analyzing: Arc<AtomicBool>,
}

/// Holds the analyzing flag for one submission and clears it when dropped.
struct AnalyzingGuard<'a>(&'a AtomicBool);

impl<'a> AnalyzingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for AnalyzingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Counsellor {
    /// Create a new counsellor.
    pub fn new(
        storage: Arc<dyn Storage>,
        generator: Arc<dyn TextGenerator>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            storage,
            generator,
            generation,
            analyzing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a submission is waiting on the model.
    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    /// Sampling parameters used for every call.
    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    /// The generator backing analyses and chat turns.
    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    /// Analyze a complete set of responses.
    ///
    /// The attempt is saved under `owner`. A failed save is logged and
    /// reported through [`SubmitOutcome::saved`]; the analysis is still
    /// returned. Only one submission runs at a time.
    pub async fn submit(
        &self,
        responses: &ResponseSet,
        owner: &User,
    ) -> Result<SubmitOutcome, CounsellorError> {
        let start = Instant::now();

        let Some(_analyzing) = AnalyzingGuard::acquire(&self.analyzing) else {
            debug!(user_id = %owner.id, "Submission already in progress");
            return Err(CounsellorError::Busy);
        };

        if !responses.covers_catalog() {
            let answered = catalog::questions()
                .iter()
                .filter(|q| responses.is_answered(q.id))
                .count();
            return Err(CounsellorError::Incomplete {
                answered,
                total: catalog::question_count(),
            });
        }

        let prompt = prompts::build_analysis_prompt(responses);
        debug!(prompt_len = prompt.len(), "Requesting analysis");

        let request = GenerateRequest::from_config(
            prompt,
            &self.generation,
            self.generation.analysis_max_tokens,
        );
        let completion = self.generator.complete(request).await?;

        let analysis = AnalysisResult::from_completion(&completion).map_err(|e| {
            warn!(error = %e, completion_len = completion.len(), "Unusable analysis reply");
            e
        })?;

        let attempt = AssessmentAttempt::new(&owner.id, responses.clone(), analysis.clone());
        let (attempt_id, saved) = match self.storage.create_attempt(&attempt).await {
            Ok(()) => (Some(attempt.id), true),
            Err(e) => {
                warn!(user_id = %owner.id, error = %e, "Failed to save attempt");
                (None, false)
            }
        };

        info!(
            saved,
            latency_ms = start.elapsed().as_millis(),
            "Assessment analysis completed"
        );

        Ok(SubmitOutcome {
            analysis,
            attempt_id,
            saved,
        })
    }

    /// Attempts owned by a user, newest first.
    pub async fn list_attempts(&self, owner: &User) -> StorageResult<Vec<AssessmentAttempt>> {
        self.storage.list_attempts(&owner.id).await
    }

    /// One attempt owned by a user.
    pub async fn get_attempt(&self, owner: &User, attempt_id: &str) -> StorageResult<AssessmentAttempt> {
        self.storage
            .get_attempt(attempt_id)
            .await?
            .filter(|attempt| attempt.user_id == owner.id)
            .ok_or_else(|| StorageError::AttemptNotFound {
                attempt_id: attempt_id.to_string(),
            })
    }
}
