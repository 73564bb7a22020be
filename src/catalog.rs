//! The fixed question catalog presented to every student.
//!
//! The catalog is defined at compile time and never mutated. Question ids are
//! 1-based and match their position in [`QUESTIONS`].

use serde::Serialize;

/// Id of the free-text question that names the student.
pub const NAME_QUESTION_ID: u32 = 1;
/// Id of the numeric question for active backlogs.
pub const BACKLOG_QUESTION_ID: u32 = 2;
/// Id of the numeric question for the current CGPA.
pub const CGPA_QUESTION_ID: u32 = 3;
/// Number of leading questions that describe the student rather than their habits.
pub const PERSONAL_INFO_COUNT: usize = 3;

/// Kind of answer a question accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    /// Free-form text.
    FreeText,
    /// A number, transmitted as its string form.
    Numeric,
    /// One of the option keys `a`..`d`.
    SingleChoice,
}

/// One selectable option of a single-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    /// Option key (`a`..`d`).
    pub key: &'static str,
    /// Human-readable label.
    pub label: &'static str,
}

/// A catalog question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Question {
    /// Positive, 1-based identifier.
    pub id: u32,
    /// Display text.
    pub text: &'static str,
    /// Accepted answer kind.
    pub kind: QuestionKind,
    /// Options for single-choice questions; empty otherwise.
    #[serde(skip_serializing_if = "has_no_options")]
    pub options: &'static [ChoiceOption],
}

impl Question {
    /// Look up the label for an option key.
    pub fn option_label(&self, key: &str) -> Option<&'static str> {
        self.options
            .iter()
            .find(|option| option.key == key)
            .map(|option| option.label)
    }

    /// Render an answer the way it should be shown to a reader: the option
    /// label for single-choice questions, the raw answer otherwise or when the
    /// key is unknown.
    pub fn display_answer<'a>(&self, answer: &'a str) -> &'a str {
        match self.kind {
            QuestionKind::SingleChoice => self.option_label(answer).unwrap_or(answer),
            _ => answer,
        }
    }
}

fn has_no_options(options: &&[ChoiceOption]) -> bool {
    options.is_empty()
}

const fn choices(labels: [&'static str; 4]) -> [ChoiceOption; 4] {
    [
        ChoiceOption { key: "a", label: labels[0] },
        ChoiceOption { key: "b", label: labels[1] },
        ChoiceOption { key: "c", label: labels[2] },
        ChoiceOption { key: "d", label: labels[3] },
    ]
}

const ATTENDANCE: [ChoiceOption; 4] = choices(["Always", "Sometimes", "Rarely", "Almost never"]);
const NOTES: [ChoiceOption; 4] = choices(["Always", "Sometimes", "Only before exams", "Never"]);
const LECTURE_FOCUS: [ChoiceOption; 4] = choices([
    "Listen attentively and take notes",
    "Chat with friends",
    "Think about unrelated things",
    "Use a mobile phone/social media",
]);
const EXAM_PREP: [ChoiceOption; 4] = choices([
    "Study daily and revise regularly",
    "Start one week before the exam",
    "Study only the night before the exam",
    "Do not prepare seriously",
]);
const DISTRACTIONS: [ChoiceOption; 4] = choices([
    "No, I stay focused",
    "Sometimes, when I'm bored",
    "Yes, often",
    "Always, I enjoy distractions",
]);
const SKIPPING: [ChoiceOption; 4] =
    choices(["Never", "Occasionally", "Frequently", "Almost every week"]);
const GOALS: [ChoiceOption; 4] = choices([
    "Yes, I set goals and follow them",
    "I have goals but don't follow them properly",
    "I don't set goals at all",
    "I don't think about the future",
]);
const ASSIGNMENTS: [ChoiceOption; 4] =
    choices(["Always", "Sometimes", "Only if forced to", "Never"]);
const UNDERSTANDING: [ChoiceOption; 4] = choices([
    "I focus on deep understanding",
    "I try, but mostly memorize",
    "I only memorize without understanding",
    "I don't study much",
]);
const SELF_ASSESSMENT: [ChoiceOption; 4] = choices([
    "I'm happy and working hard",
    "I need to improve but lack motivation",
    "I don't care much about it",
    "I am disappointed but don't take action",
]);

const fn single_choice(id: u32, text: &'static str, options: &'static [ChoiceOption]) -> Question {
    Question {
        id,
        text,
        kind: QuestionKind::SingleChoice,
        options,
    }
}

/// The ordered question catalog.
pub static QUESTIONS: [Question; 13] = [
    Question {
        id: NAME_QUESTION_ID,
        text: "What is your full name?",
        kind: QuestionKind::FreeText,
        options: &[],
    },
    Question {
        id: BACKLOG_QUESTION_ID,
        text: "How many active backlogs do you currently have?",
        kind: QuestionKind::Numeric,
        options: &[],
    },
    Question {
        id: CGPA_QUESTION_ID,
        text: "What is your current CGPA?",
        kind: QuestionKind::Numeric,
        options: &[],
    },
    single_choice(4, "How often do you attend your classes?", &ATTENDANCE),
    single_choice(5, "Do you take proper notes in class?", &NOTES),
    single_choice(
        6,
        "What do you do when the teacher is explaining an important concept?",
        &LECTURE_FOCUS,
    ),
    single_choice(7, "How do you prepare for exams?", &EXAM_PREP),
    single_choice(
        8,
        "Do you discuss unnecessary topics during study hours?",
        &DISTRACTIONS,
    ),
    single_choice(
        9,
        "How often do you skip college without a genuine reason?",
        &SKIPPING,
    ),
    single_choice(10, "Do you set academic goals and work towards them?", &GOALS),
    single_choice(11, "Do you complete your assignments on time?", &ASSIGNMENTS),
    single_choice(
        12,
        "When studying, do you try to understand concepts deeply or just memorize?",
        &UNDERSTANDING,
    ),
    single_choice(
        13,
        "How do you feel about your current academic performance?",
        &SELF_ASSESSMENT,
    ),
];

/// All catalog questions, in presentation order.
pub fn questions() -> &'static [Question] {
    &QUESTIONS
}

/// Number of questions in the catalog.
pub fn question_count() -> usize {
    QUESTIONS.len()
}

/// Look up a question by id.
pub fn question(id: u32) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.id == id)
}

/// Look up a question by its position in the catalog.
pub fn question_at(index: usize) -> Option<&'static Question> {
    QUESTIONS.get(index)
}
