use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{validate_answer, ResponseSet};
use crate::catalog::{self, Question};
use crate::error::{NavigationError, ValidationError};
use crate::slots::{SlotStore, ASSESSMENT_SLOT};

/// What is written to the assessment slot after every mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedAssessment {
    responses: ResponseSet,
    current_question: usize,
}

/// Observable snapshot of an in-progress assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// Index of the active question.
    pub index: usize,
    /// The active question.
    pub question: Question,
    /// Recorded responses.
    pub responses: ResponseSet,
    /// Number of answered questions.
    pub answered: usize,
    /// Number of catalog questions.
    pub total: usize,
    /// Answered share of the catalog, 0-100.
    pub percent: f64,
    /// Whether every question is answered.
    pub complete: bool,
    /// Field-level error from the last rejected answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Navigation and answer state for one questionnaire attempt.
///
/// Every mutation is written through to the assessment slot and published to
/// subscribers.
pub struct AssessmentSession {
    index: usize,
    responses: ResponseSet,
    error: Option<String>,
    slots: Arc<dyn SlotStore>,
    notifier: watch::Sender<Progress>,
}

impl AssessmentSession {
    /// Create an empty session without reading the slot.
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self::from_parts(slots, 0, ResponseSet::new())
    }

    /// Restore the session persisted in the assessment slot, if any.
    pub fn restore(slots: Arc<dyn SlotStore>) -> Self {
        let persisted: PersistedAssessment = slots.load(ASSESSMENT_SLOT).unwrap_or_default();
        let last = catalog::question_count() - 1;
        let index = persisted.current_question.min(last);

        info!(
            index,
            answered = persisted.responses.len(),
            "Restored assessment state"
        );

        Self::from_parts(slots, index, persisted.responses)
    }

    fn from_parts(slots: Arc<dyn SlotStore>, index: usize, responses: ResponseSet) -> Self {
        let initial = build_progress(index, &responses, None);
        let (notifier, _) = watch::channel(initial);
        Self {
            index,
            responses,
            error: None,
            slots,
            notifier,
        }
    }

    /// Record an answer after validating it.
    ///
    /// A rejected answer leaves the responses untouched and is reported both
    /// as the returned error and as the session's field error.
    pub fn answer(
        &mut self,
        question_id: u32,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let value = value.into();
        let result = catalog::question(question_id)
            .ok_or(ValidationError::UnknownQuestion { question_id })
            .and_then(|q| validate_answer(q, &value));

        match result {
            Ok(()) => {
                debug!(question_id, "Answer recorded");
                self.responses.insert(question_id, value.trim());
                self.error = None;
                self.commit();
                Ok(())
            }
            Err(e) => {
                debug!(question_id, error = %e, "Answer rejected");
                self.error = Some(e.to_string());
                self.publish();
                Err(e)
            }
        }
    }

    /// Move to the next question. Does nothing unless the active question is
    /// answered and is not the last one.
    pub fn advance(&mut self) -> bool {
        let current_id = self.current_question().id;
        if !self.responses.is_answered(current_id) || self.index + 1 >= catalog::question_count() {
            return false;
        }

        self.index += 1;
        self.error = None;
        self.commit();
        true
    }

    /// Move to the previous question. Does nothing on the first question.
    pub fn retreat(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }

        self.index -= 1;
        self.error = None;
        self.commit();
        true
    }

    /// Jump to a question. Allowed for the first question, any answered
    /// question, or the question right after an answered one.
    pub fn jump_to(&mut self, index: usize) -> Result<(), NavigationError> {
        let count = catalog::question_count();
        let target = catalog::question_at(index)
            .ok_or(NavigationError::OutOfRange { index, count })?;

        let reachable = index == 0
            || self.responses.is_answered(target.id)
            || catalog::question_at(index - 1).is_some_and(|prev| self.responses.is_answered(prev.id));

        if !reachable {
            return Err(NavigationError::Locked { index });
        }

        self.index = index;
        self.error = None;
        self.commit();
        Ok(())
    }

    /// Discard every response and return to the first question.
    pub fn reset(&mut self) {
        self.responses.clear();
        self.index = 0;
        self.error = None;
        self.commit();
        info!("Assessment reset");
    }

    /// Index of the active question.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The active question.
    pub fn current_question(&self) -> &'static Question {
        // index is kept within the catalog by every transition
        &catalog::questions()[self.index]
    }

    /// Recorded responses.
    pub fn responses(&self) -> &ResponseSet {
        &self.responses
    }

    /// Field error from the last rejected answer.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether every question is answered.
    pub fn is_complete(&self) -> bool {
        self.responses.covers_catalog()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Progress {
        build_progress(self.index, &self.responses, self.error.clone())
    }

    /// Subscribe to snapshots published after every change.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.notifier.subscribe()
    }

    fn commit(&mut self) {
        let persisted = PersistedAssessment {
            responses: self.responses.clone(),
            current_question: self.index,
        };
        if let Err(e) = self.slots.save(ASSESSMENT_SLOT, &persisted) {
            warn!(error = %e, "Failed to persist assessment state");
        }
        self.publish();
    }

    fn publish(&self) {
        self.notifier.send_replace(self.snapshot());
    }
}

fn build_progress(index: usize, responses: &ResponseSet, error: Option<String>) -> Progress {
    let total = catalog::question_count();
    let answered = catalog::questions()
        .iter()
        .filter(|q| responses.is_answered(q.id))
        .count();

    Progress {
        index,
        question: catalog::questions()[index],
        responses: responses.clone(),
        answered,
        total,
        percent: answered as f64 * 100.0 / total as f64,
        complete: answered == total,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::MemorySlotStore;

    fn session() -> (AssessmentSession, Arc<dyn SlotStore>) {
        let slots: Arc<dyn SlotStore> = Arc::new(MemorySlotStore::new());
        (AssessmentSession::new(Arc::clone(&slots)), slots)
    }

    #[test]
    fn test_latest_answer_wins() {
        let (mut s, _) = session();
        s.answer(4, "a").unwrap();
        s.answer(4, "b").unwrap();
        s.answer(4, "c").unwrap();

        assert_eq!(s.responses().len(), 1);
        assert_eq!(s.responses().get(4), Some("c"));
    }

    #[test]
    fn test_rejected_answer_leaves_state_unchanged() {
        let (mut s, _) = session();
        s.answer(3, "3.5").unwrap();

        let err = s.answer(3, "11.0").unwrap_err();
        assert_eq!(err, ValidationError::CgpaOutOfRange);
        assert_eq!(s.responses().get(3), Some("3.5"));
        assert_eq!(s.error(), Some("CGPA must be between 0.00 and 10.00"));

        s.answer(3, "4.0").unwrap();
        assert_eq!(s.error(), None);
    }

    #[test]
    fn test_unknown_question_is_a_field_error() {
        let (mut s, _) = session();
        assert_eq!(
            s.answer(99, "x"),
            Err(ValidationError::UnknownQuestion { question_id: 99 })
        );
        assert!(s.responses().is_empty());
    }

    #[test]
    fn test_advance_requires_current_answer() {
        let (mut s, _) = session();
        assert!(!s.advance());
        assert_eq!(s.index(), 0);

        s.answer(1, "Asha").unwrap();
        assert!(s.advance());
        assert_eq!(s.index(), 1);
    }

    #[test]
    fn test_advance_stops_at_last_question() {
        let (mut s, _) = session();
        for q in catalog::questions() {
            let answer = match q.id {
                1 => "Asha",
                2 => "0",
                3 => "8.2",
                _ => "a",
            };
            s.answer(q.id, answer).unwrap();
            s.advance();
        }

        assert_eq!(s.index(), catalog::question_count() - 1);
        assert!(!s.advance());
        assert!(s.is_complete());
    }

    #[test]
    fn test_retreat_is_noop_at_start() {
        let (mut s, _) = session();
        assert!(!s.retreat());

        s.answer(1, "Asha").unwrap();
        s.advance();
        assert!(s.retreat());
        assert_eq!(s.index(), 0);
    }

    #[test]
    fn test_jump_rules() {
        let (mut s, _) = session();
        assert!(s.jump_to(0).is_ok());
        assert_eq!(s.jump_to(2), Err(NavigationError::Locked { index: 2 }));

        s.answer(1, "Asha").unwrap();
        assert!(s.jump_to(1).is_ok());
        assert_eq!(s.index(), 1);
        assert_eq!(s.jump_to(2), Err(NavigationError::Locked { index: 2 }));

        s.answer(2, "1").unwrap();
        s.answer(3, "7.5").unwrap();
        assert!(s.jump_to(3).is_ok());
        assert!(s.jump_to(2).is_ok());
        assert_eq!(s.jump_to(5), Err(NavigationError::Locked { index: 5 }));
        assert_eq!(
            s.jump_to(13),
            Err(NavigationError::OutOfRange { index: 13, count: 13 })
        );
    }

    #[test]
    fn test_jump_clears_field_error() {
        let (mut s, _) = session();
        s.answer(1, "Asha").unwrap();
        assert!(s.answer(3, "7").is_err());
        assert!(s.error().is_some());

        s.jump_to(1).unwrap();
        assert_eq!(s.error(), None);
        assert!(s.snapshot().error.is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut s, _) = session();
        s.answer(1, "Asha").unwrap();
        s.advance();
        let _ = s.answer(2, "-3");

        s.reset();
        assert!(s.responses().is_empty());
        assert_eq!(s.index(), 0);
        assert_eq!(s.error(), None);
    }

    #[test]
    fn test_state_survives_restore() {
        let (mut s, slots) = session();
        s.answer(1, "Asha").unwrap();
        s.advance();
        s.answer(2, "2").unwrap();

        let restored = AssessmentSession::restore(slots);
        assert_eq!(restored.index(), 1);
        assert_eq!(restored.responses(), s.responses());
    }

    #[test]
    fn test_restore_clamps_out_of_range_index() {
        let slots: Arc<dyn SlotStore> = Arc::new(MemorySlotStore::new());
        slots
            .write(ASSESSMENT_SLOT, r#"{"responses":[],"currentQuestion":40}"#)
            .unwrap();

        let restored = AssessmentSession::restore(slots);
        assert_eq!(restored.index(), catalog::question_count() - 1);
    }

    #[test]
    fn test_subscribers_see_every_change() {
        let (mut s, _) = session();
        let mut rx = s.subscribe();

        s.answer(1, "Asha").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().answered, 1);

        s.advance();
        let progress = rx.borrow_and_update().clone();
        assert_eq!(progress.index, 1);
        assert_eq!(progress.question.id, 2);

        let _ = s.answer(2, "many");
        assert_eq!(
            rx.borrow().error.as_deref(),
            Some("Please enter a valid number")
        );
    }

    #[test]
    fn test_progress_percent() {
        let (mut s, _) = session();
        s.answer(1, "Asha").unwrap();
        let progress = s.snapshot();
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.total, 13);
        assert!((progress.percent - 100.0 / 13.0).abs() < 1e-9);
        assert!(!progress.complete);
    }
}
