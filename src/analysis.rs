//! Analysis results and their recovery from free-text model replies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ParseError;

/// Learning-style analysis produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Narrative description of the student's learning style.
    pub learning_persona: String,
    /// Observed strengths.
    pub strengths: Vec<String>,
    /// Areas the student should work on.
    pub areas_for_improvement: Vec<String>,
    /// Actionable recommendations.
    pub recommendations: Vec<String>,
}

impl AnalysisResult {
    /// Recover an analysis from raw model output.
    ///
    /// Takes the text between the first `{` and the last `}` (inclusive) and
    /// decodes it as a JSON object. Any text around the object is ignored. If
    /// the model emits a second object after the intended one the slice spans
    /// both and decoding fails.
    pub fn from_completion(completion: &str) -> Result<Self, ParseError> {
        let start = completion.find('{');
        let end = completion.rfind('}');

        let (start, end) = match (start, end) {
            (Some(start), Some(end)) if start < end => (start, end),
            _ => {
                debug!(len = completion.len(), "No JSON object in completion");
                return Err(ParseError::MalformedReply {
                    message: "No JSON object found in reply".to_string(),
                });
            }
        };

        // Both indices sit on single-byte '{' / '}' so the slice is on char boundaries
        let candidate = &completion[start..=end];

        let object: Map<String, Value> =
            serde_json::from_str(candidate).map_err(|e| ParseError::MalformedReply {
                message: e.to_string(),
            })?;

        Ok(Self {
            learning_persona: persona_field(&object)?,
            strengths: list_field(&object, "strengths")?,
            areas_for_improvement: list_field(&object, "areasForImprovement")?,
            recommendations: list_field(&object, "recommendations")?,
        })
    }
}

fn incomplete(field: &str) -> ParseError {
    ParseError::IncompleteReply {
        field: field.to_string(),
    }
}

fn persona_field(object: &Map<String, Value>) -> Result<String, ParseError> {
    match object.get("learningPersona") {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(incomplete("learningPersona")),
    }
}

fn list_field(object: &Map<String, Value>, field: &str) -> Result<Vec<String>, ParseError> {
    let items = match object.get(field) {
        Some(Value::Array(items)) => items,
        _ => return Err(incomplete(field)),
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            _ => Err(incomplete(field)),
        })
        .collect()
}
