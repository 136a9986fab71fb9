pub mod ai_examiner;
pub mod deeplink;
pub mod feedback;
pub mod policy;
pub mod session;

use crate::quiz::policy::AssessmentPolicy;

/// Number of questions requested for every attempt.
pub const QUESTION_COUNT: usize = 5;

/// Elementary-school grades the system covers.
pub const GRADES: std::ops::RangeInclusive<u8> = 1..=6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Subject {
    Chinese,
    Math,
    Science,
    Social,
}

impl Subject {
    pub const ALL: [Subject; 4] = [
        Subject::Chinese,
        Subject::Math,
        Subject::Science,
        Subject::Social,
    ];

    /// Stable code carried in practice links.
    pub fn code(&self) -> &'static str {
        match self {
            Subject::Chinese => "chinese",
            Subject::Math => "math",
            Subject::Science => "science",
            Subject::Social => "social",
        }
    }

    /// Label shown to users and embedded in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Subject::Chinese => "國語",
            Subject::Math => "數學",
            Subject::Science => "自然科學",
            Subject::Social => "社會",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|subject| subject.code() == code)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|subject| subject.label() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AssessmentType {
    Placement,
    Diagnostic,
    Formative,
    Summative,
    Competency,
}

impl AssessmentType {
    pub const ALL: [AssessmentType; 5] = [
        AssessmentType::Placement,
        AssessmentType::Diagnostic,
        AssessmentType::Formative,
        AssessmentType::Summative,
        AssessmentType::Competency,
    ];

    /// Stable code carried in practice links.
    pub fn code(&self) -> &'static str {
        match self {
            AssessmentType::Placement => "placement",
            AssessmentType::Diagnostic => "diagnostic",
            AssessmentType::Formative => "formative",
            AssessmentType::Summative => "summative",
            AssessmentType::Competency => "competency",
        }
    }

    /// Difficulty and distractor policy the examiner follows for this type.
    pub fn policy(&self) -> &'static AssessmentPolicy {
        match self {
            AssessmentType::Placement => &policy::PLACEMENT,
            AssessmentType::Diagnostic => &policy::DIAGNOSTIC,
            AssessmentType::Formative => &policy::FORMATIVE,
            AssessmentType::Summative => &policy::SUMMATIVE,
            AssessmentType::Competency => &policy::COMPETENCY,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|assess| assess.code() == code)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|assess| assess.policy().label == label)
    }
}

/// Parameters of one assessment, set once on the configuration screens or
/// parsed from a practice link, read-only afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizConfig {
    pub subject: Subject,
    pub grade: u8,
    pub unit: String,
    pub assess_type: AssessmentType,
}

/// One generated item, parsed from the examiner's JSON reply.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    #[serde(rename = "q")]
    pub text: String,
    /// Exactly four options, order-significant and index-addressed.
    pub options: [String; 4],
    /// Index of the correct option, 0..=3.
    pub ans: u8,
    pub explanation: String,
    /// Cognitive-level label; display only, never drives control flow.
    #[serde(rename = "bloomLevel", default = "default_bloom_level")]
    pub bloom_level: String,
}

fn default_bloom_level() -> String {
    "綜合".to_string()
}

/// Outcome of one answered question; appended to the session history when
/// the user advances, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnswerRecord {
    pub question: Question,
    /// Option index the user picked.
    pub chosen: u8,
    /// Option index stored as correct on the question.
    pub answer: u8,
    pub is_correct: bool,
}

impl AnswerRecord {
    pub fn chosen_text(&self) -> &str {
        &self.question.options[self.chosen as usize]
    }

    pub fn answer_text(&self) -> &str {
        &self.question.options[self.answer as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_codes_round_trip() {
        for subject in Subject::ALL {
            assert_eq!(Subject::from_code(subject.code()), Some(subject));
            assert_eq!(Subject::from_label(subject.label()), Some(subject));
        }
        assert_eq!(Subject::from_code("history"), None);
    }

    #[test]
    fn assessment_codes_round_trip() {
        for assess in AssessmentType::ALL {
            assert_eq!(AssessmentType::from_code(assess.code()), Some(assess));
            assert_eq!(
                AssessmentType::from_label(assess.policy().label),
                Some(assess)
            );
        }
        assert_eq!(AssessmentType::from_code("quiz"), None);
    }

    #[test]
    fn question_parses_the_wire_shape() {
        let raw = r#"{
            "q": "½ + ¼ = ?",
            "options": ["¾", "²⁄₆", "⅙", "½"],
            "ans": 0,
            "explanation": "通分後再相加。",
            "bloomLevel": "應用"
        }"#;
        let question: Question = serde_json::from_str(raw).expect("shape should parse");
        assert_eq!(question.text, "½ + ¼ = ?");
        assert_eq!(question.options[3], "½");
        assert_eq!(question.ans, 0);
        assert_eq!(question.bloom_level, "應用");
    }

    #[test]
    fn missing_bloom_level_defaults() {
        let raw = r#"{"q": "題目", "options": ["a", "b", "c", "d"], "ans": 1, "explanation": "解析"}"#;
        let question: Question = serde_json::from_str(raw).expect("shape should parse");
        assert_eq!(question.bloom_level, "綜合");
    }

    #[test]
    fn five_options_do_not_parse() {
        let raw = r#"{"q": "題目", "options": ["a", "b", "c", "d", "e"], "ans": 1, "explanation": "解析"}"#;
        assert!(serde_json::from_str::<Question>(raw).is_err());
    }
}
