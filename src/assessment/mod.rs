//! Questionnaire responses, answer validation and navigation state.

mod session;
mod validation;

pub use session::{AssessmentSession, Progress};
pub use validation::validate_answer;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog;

/// One recorded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Catalog question id.
    pub question_id: u32,
    /// Free text, the string form of a number, or an option key.
    pub answer: String,
}

impl Response {
    /// Create a response.
    pub fn new(question_id: u32, answer: impl Into<String>) -> Self {
        Self {
            question_id,
            answer: answer.into(),
        }
    }
}

/// The set of responses for one attempt, keyed by question id.
///
/// Holds at most one answer per question; recording an answer for an already
/// answered question replaces it. Serialized as an array ordered by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Response>", into = "Vec<Response>")]
pub struct ResponseSet {
    answers: BTreeMap<u32, String>,
}

impl ResponseSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer, replacing any previous answer to the same question.
    pub fn insert(&mut self, question_id: u32, answer: impl Into<String>) {
        self.answers.insert(question_id, answer.into());
    }

    /// The answer recorded for a question.
    pub fn get(&self, question_id: u32) -> Option<&str> {
        self.answers.get(&question_id).map(String::as_str)
    }

    /// Whether a non-empty answer is recorded for a question.
    pub fn is_answered(&self, question_id: u32) -> bool {
        self.get(question_id).is_some_and(|a| !a.is_empty())
    }

    /// Number of recorded answers.
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Whether no answers are recorded.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Remove every answer.
    pub fn clear(&mut self) {
        self.answers.clear();
    }

    /// Whether every catalog question has an answer.
    pub fn covers_catalog(&self) -> bool {
        catalog::questions().iter().all(|q| self.is_answered(q.id))
    }

    /// Responses ordered by question id.
    pub fn iter(&self) -> impl Iterator<Item = Response> + '_ {
        self.answers
            .iter()
            .map(|(id, answer)| Response::new(*id, answer.clone()))
    }

    /// The student's name (question 1), if answered.
    pub fn student_name(&self) -> Option<&str> {
        self.get(catalog::NAME_QUESTION_ID)
    }

    /// Active backlog count as entered (question 2).
    pub fn backlogs(&self) -> Option<&str> {
        self.get(catalog::BACKLOG_QUESTION_ID)
    }

    /// CGPA as entered (question 3).
    pub fn cgpa(&self) -> Option<&str> {
        self.get(catalog::CGPA_QUESTION_ID)
    }
}

impl From<Vec<Response>> for ResponseSet {
    fn from(responses: Vec<Response>) -> Self {
        let mut set = ResponseSet::new();
        for response in responses {
            set.insert(response.question_id, response.answer);
        }
        set
    }
}

impl From<ResponseSet> for Vec<Response> {
    fn from(set: ResponseSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<Response> for ResponseSet {
    fn from_iter<I: IntoIterator<Item = Response>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}
