//! Centralized prompt templates and builders.
//!
//! Every builder is a pure function of its inputs: the same responses,
//! analysis and transcript always render the same prompt. Answers are always
//! preceded by their question text, and single-choice answers are rendered as
//! their option label.

use crate::analysis::AnalysisResult;
use crate::assessment::ResponseSet;
use crate::catalog::{self, PERSONAL_INFO_COUNT};
use crate::chat::ChatMessage;

/// Opening instruction for the analysis prompt.
pub const ANALYSIS_PREAMBLE: &str = "As an experienced academic counselor, analyze these student responses and provide a comprehensive, personalized assessment in JSON format. The analysis should be detailed, encouraging, and actionable, taking into account the student's personal academic situation.";

/// Output contract for the analysis prompt.
pub const ANALYSIS_OUTPUT_FORMAT: &str = r#"Based on these responses, create a detailed JSON object with the following structure:
{
  "learningPersona": "A detailed, personalized description of the student's learning style, approach to education, and current academic mindset. This should be 3-4 sentences long, directly address the student, and consider their current CGPA and backlog situation.",
  "strengths": [
    "Detailed strength with specific examples from their responses",
    "Another strength with explanation of its academic impact",
    "Additional strength highlighting positive behaviors",
    "More strengths if identified"
  ],
  "areasForImprovement": [
    "Specific area for improvement with clear context",
    "Another area with explanation of its importance",
    "Additional improvement area with potential impact",
    "More areas if relevant"
  ],
  "recommendations": [
    "Detailed, actionable recommendation with specific steps",
    "Time-management or study technique with implementation details",
    "Specific resource or tool recommendation with usage guidance",
    "Additional practical suggestions for improvement",
    "Long-term strategy for academic success that addresses current CGPA and backlogs"
  ]
}"#;

/// Closing instruction for the analysis prompt.
pub const ANALYSIS_CLOSING: &str = "Ensure each section is detailed and specific to the student's responses, including their academic status (CGPA and backlogs). Include practical examples and clear action items. The tone should be encouraging and supportive while maintaining professionalism.";

/// Role description for the assessment follow-up chat.
pub const ASSESSMENT_CHAT_PREAMBLE: &str = "You are an AI academic counselor helping a student understand their assessment results. Here are the student's assessment results and personal information:";

/// Closing instruction for the assessment follow-up chat.
pub const ASSESSMENT_CHAT_CLOSING: &str = "Provide a helpful, personalized response based on the assessment results and the student's specific information. If the student asks about their CGPA, backlogs, strengths, areas for improvement, or any other aspect of their assessment, provide the exact information from their results. Be encouraging and supportive while giving practical advice that relates to their specific situation. Keep responses short and easy to understand.";

/// Role description for the general counsellor chat.
pub const GENERAL_CHAT_PREAMBLE: &str = r#"You are an AI academic counselor specializing in helping students improve their academic performance and study habits. Your responses should be brief, helpful, encouraging, and focused on providing practical advice. You can help with:

1. Questions about the assessment process
2. Study techniques and time management, given as points for easier understanding
3. Academic motivation and goal setting
4. Learning strategies, techniques and study habits
5. General academic guidance
6. Avoiding cheap dopamine and staying on the right track
7. Overcoming distractions like social media and phones to stay focused
8. When the student only greets you, keep the answer as short as possible"#;

/// Closing instruction for the general counsellor chat.
pub const GENERAL_CHAT_CLOSING: &str = "Provide a helpful, encouraging response that includes specific advice or information when applicable. Keep the tone professional but friendly.";

/// Cue that asks the model to answer as the assistant.
pub const ANSWER_CUE: &str = "A:";

/// Build the prompt that asks the model for a learning-style analysis.
///
/// The personal questions (name, backlogs, CGPA) are rendered as
/// `question: answer`; the study-habit questions as `Question:`/`Answer:`
/// pairs. Questions are rendered in catalog order and unanswered ones are
/// skipped.
pub fn build_analysis_prompt(responses: &ResponseSet) -> String {
    let mut personal = Vec::new();
    let mut habits = Vec::new();

    for (position, question) in catalog::questions().iter().enumerate() {
        let Some(answer) = responses.get(question.id) else {
            continue;
        };
        let answer = question.display_answer(answer);

        if position < PERSONAL_INFO_COUNT {
            personal.push(format!("{}: {}", question.text, answer));
        } else {
            habits.push(format!("Question: {}\nAnswer: {}", question.text, answer));
        }
    }

    format!(
        "{}\n\nStudent Personal Information:\n{}\n\nStudy Habits and Attitudes:\n{}\n\n{}\n\n{}",
        ANALYSIS_PREAMBLE,
        personal.join("\n"),
        habits.join("\n\n"),
        ANALYSIS_OUTPUT_FORMAT,
        ANALYSIS_CLOSING
    )
}

/// Build the prompt for one turn of the follow-up chat about an analysis.
///
/// `history` is rendered oldest first and must not include `utterance`.
pub fn build_assessment_chat_prompt(
    analysis: &AnalysisResult,
    responses: &ResponseSet,
    history: &[ChatMessage],
    utterance: &str,
) -> String {
    format!(
        "{preamble}\n\n\
         Student Name: {name}\n\
         CGPA: {cgpa}\n\
         Active Backlogs: {backlogs}\n\n\
         Learning Persona: {persona}\n\n\
         Strengths:\n{strengths}\n\n\
         Areas for Improvement:\n{areas}\n\n\
         Recommendations:\n{recommendations}\n\n\
         Detailed Assessment Responses:\n{details}\n\n\
         Previous conversation:\n{history}\n\n\
         USER: {utterance}\n\n\
         {closing}\n\n\
         {cue}",
        preamble = ASSESSMENT_CHAT_PREAMBLE,
        name = responses.student_name().unwrap_or(""),
        cgpa = responses.cgpa().unwrap_or("0"),
        backlogs = responses.backlogs().unwrap_or("0"),
        persona = analysis.learning_persona,
        strengths = bullet_list(&analysis.strengths),
        areas = bullet_list(&analysis.areas_for_improvement),
        recommendations = bullet_list(&analysis.recommendations),
        details = render_responses(responses),
        history = render_history(history),
        utterance = utterance,
        closing = ASSESSMENT_CHAT_CLOSING,
        cue = ANSWER_CUE,
    )
}

/// Build the prompt for one turn of the general counsellor chat.
///
/// `history` is rendered oldest first and must not include `utterance`.
pub fn build_general_chat_prompt(history: &[ChatMessage], utterance: &str) -> String {
    format!(
        "{}\n\nPrevious conversation:\n{}\n\nUSER: {}\n\n{}\n\n{}",
        GENERAL_CHAT_PREAMBLE,
        render_history(history),
        utterance,
        GENERAL_CHAT_CLOSING,
        ANSWER_CUE
    )
}

/// Every recorded response as `Question:`/`Answer:` pairs in catalog order.
pub fn render_responses(responses: &ResponseSet) -> String {
    catalog::questions()
        .iter()
        .filter_map(|question| {
            responses.get(question.id).map(|answer| {
                format!(
                    "Question: {}\nAnswer: {}",
                    question.text,
                    question.display_answer(answer)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Transcript as `ROLE: content` lines, oldest first.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
