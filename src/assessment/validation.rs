use crate::catalog::{Question, QuestionKind, BACKLOG_QUESTION_ID, CGPA_QUESTION_ID};
use crate::error::ValidationError;

/// Validate a raw answer for a question.
///
/// This is the only answer check in the crate: the tool layer calls it to
/// report field errors and [`super::AssessmentSession::answer`] calls it
/// before mutating state.
pub fn validate_answer(question: &Question, answer: &str) -> Result<(), ValidationError> {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    match question.kind {
        QuestionKind::FreeText => Ok(()),
        QuestionKind::Numeric => validate_number(question.id, trimmed),
        QuestionKind::SingleChoice => {
            if question.option_label(trimmed).is_some() {
                Ok(())
            } else {
                Err(ValidationError::UnknownOption {
                    key: trimmed.to_string(),
                })
            }
        }
    }
}

fn validate_number(question_id: u32, raw: &str) -> Result<(), ValidationError> {
    let value: f64 = raw.parse().map_err(|_| ValidationError::NotANumber)?;
    if !value.is_finite() {
        return Err(ValidationError::NotANumber);
    }

    match question_id {
        CGPA_QUESTION_ID => {
            if !raw.contains('.') {
                return Err(ValidationError::MissingDecimal);
            }
            if !(0.0..=10.0).contains(&value) {
                return Err(ValidationError::CgpaOutOfRange);
            }
            Ok(())
        }
        BACKLOG_QUESTION_ID if value < 0.0 => Err(ValidationError::NegativeBacklogs),
        _ => Ok(()),
    }
}
