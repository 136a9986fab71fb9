//! AI examiner: builds the generation prompts, calls the model and turns
//! its replies into validated question sets and diagnosis text.

use std::fmt::{self, Display};

use chatgpt::client::ChatGPT;
use chatgpt::types::CompletionResponse;

use crate::quiz::{AnswerRecord, Question, QuizConfig, QUESTION_COUNT};

/// Why a question-set request produced no usable questions. Shown to the
/// user, so the variants render into short readable reasons.
#[derive(Debug)]
pub enum GenerationError {
    /// The model call itself failed (network, auth, timeout).
    Api(chatgpt::err::Error),
    /// The reply was not a JSON array of well-formed questions.
    Malformed(serde_json::Error),
    /// The reply parsed but held the wrong number of questions.
    WrongCount(usize),
    /// A question marked an answer index outside its options.
    AnswerOutOfRange(u8),
}

impl From<chatgpt::err::Error> for GenerationError {
    fn from(err: chatgpt::err::Error) -> Self {
        GenerationError::Api(err)
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::Malformed(err)
    }
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::Api(err) => write!(f, "model call failed: {err}"),
            GenerationError::Malformed(err) => {
                write!(f, "reply is not a valid question array: {err}")
            }
            GenerationError::WrongCount(count) => {
                write!(f, "expected {QUESTION_COUNT} questions, got {count}")
            }
            GenerationError::AnswerOutOfRange(ans) => {
                write!(f, "answer index {ans} is outside the options")
            }
        }
    }
}

/// Why the diagnosis call produced nothing. Callers degrade this to a
/// static fallback instead of surfacing it.
#[derive(Debug)]
pub enum DiagnosisError {
    Api(chatgpt::err::Error),
    /// The model returned an empty reply, which must not be stored: an
    /// empty diagnosis means "not computed yet".
    Empty,
}

impl From<chatgpt::err::Error> for DiagnosisError {
    fn from(err: chatgpt::err::Error) -> Self {
        DiagnosisError::Api(err)
    }
}

impl Display for DiagnosisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosisError::Api(err) => write!(f, "model call failed: {err}"),
            DiagnosisError::Empty => write!(f, "model returned an empty diagnosis"),
        }
    }
}

pub struct Examiner {
    chat_gpt: ChatGPT,
}

impl Examiner {
    pub fn new(chat_gpt: ChatGPT) -> Self {
        Self { chat_gpt }
    }

    /// Requests one fresh question set for the configuration. Every call is
    /// an independent draw; callers invoke this once per attempt start.
    pub async fn generate_questions(
        &self,
        config: &QuizConfig,
    ) -> Result<Vec<Question>, GenerationError> {
        let prompt = build_question_prompt(config);
        log::debug!("question prompt: {} bytes", prompt.len());
        let response: CompletionResponse = self.chat_gpt.send_message(&prompt).await?;
        let content = response.message().clone().content;
        log::debug!("question-set reply: {} bytes", content.len());
        parse_questions(&content)
    }

    /// Requests the short teacher-facing diagnosis for the mistakes of a
    /// finished attempt.
    pub async fn generate_diagnosis(
        &self,
        config: &QuizConfig,
        mistakes: &[&AnswerRecord],
    ) -> Result<String, DiagnosisError> {
        let prompt = build_diagnosis_prompt(config, mistakes);
        let response: CompletionResponse = self.chat_gpt.send_message(&prompt).await?;
        let content = response.message().clone().content.trim().to_string();
        if content.is_empty() {
            return Err(DiagnosisError::Empty);
        }
        Ok(content)
    }
}

/// Strips the markdown code fences models add despite instructions.
fn strip_code_fences(reply: &str) -> &str {
    let reply = reply.trim();
    let reply = reply
        .strip_prefix("```json")
        .or_else(|| reply.strip_prefix("```"))
        .unwrap_or(reply);
    reply.strip_suffix("```").unwrap_or(reply).trim()
}

/// Parses and validates a question-set reply. Either exactly
/// [`QUESTION_COUNT`] well-formed questions come back or the whole reply
/// is rejected; a partial set never reaches the quiz screen.
pub fn parse_questions(reply: &str) -> Result<Vec<Question>, GenerationError> {
    let questions: Vec<Question> = serde_json::from_str(strip_code_fences(reply))?;
    if questions.len() != QUESTION_COUNT {
        return Err(GenerationError::WrongCount(questions.len()));
    }
    if let Some(q) = questions
        .iter()
        .find(|q| q.ans as usize >= q.options.len())
    {
        return Err(GenerationError::AnswerOutOfRange(q.ans));
    }
    Ok(questions)
}

pub fn build_question_prompt(config: &QuizConfig) -> String {
    let policy = config.assess_type.policy();
    format!(
        r#"你是一位專業的台灣國小教師與測驗編製專家。請根據以下嚴格的教學設計規範，出 {count} 題單選題：

1. **對象**：國小 {grade} 年級學生
2. **科目**：{subject}
3. **單元/主題**：{unit}
4. **語言**：繁體中文（台灣用語）

5. **嚴格的年級適用性檢核 (Grade-Level Appropriateness)**：
   - 請遵循螺旋式課程的精神：同一主題在不同年級有嚴格的深度界線。
   - 你目前出的是「{grade} 年級」的題目，**絕對禁止**使用 {next_grade} 年級以上才教的概念。
   - 數字大小與詞彙難度必須符合 {grade} 年級學生的認知負荷。

6. **評量類型與難度設計**：
   - 類型：{label}（注意：這是盲測，題目中不要提及評量類型）
   - 難度設定：{difficulty}
   - 認知層次：{cognitive}
   - 誘答設計：{distractor}

**輸出格式規範 (CRITICAL)**：
1. 回傳合法的 JSON Array，剛好 {count} 個物件，不要有任何 Markdown 標記或額外文字。
2. 數學式一律使用純 Unicode 符號（例如 ½、×、÷、−、√），禁止 LaTeX 與反斜線轉義。

[
  {{
    "q": "題目文字",
    "options": ["選項A", "選項B", "選項C", "選項D"],
    "ans": 0,
    "explanation": "詳細解析，說明為何正解正確、誘答選項錯在哪裡。",
    "bloomLevel": "該題的認知層次"
  }}
]"#,
        count = QUESTION_COUNT,
        grade = config.grade,
        next_grade = config.grade + 1,
        subject = config.subject.label(),
        unit = config.unit,
        label = policy.label,
        difficulty = policy.difficulty_band,
        cognitive = policy.cognitive_target,
        distractor = policy.distractor_guidance,
    )
}

pub fn build_diagnosis_prompt(config: &QuizConfig, mistakes: &[&AnswerRecord]) -> String {
    let mut details = String::new();
    for (idx, record) in mistakes.iter().enumerate() {
        details.push_str(&format!(
            "錯題 {}: 題目[{}] 誤選[{}] 正解[{}]\n",
            idx + 1,
            record.question.text,
            record.chosen_text(),
            record.answer_text(),
        ));
    }
    format!(
        r#"你是一位資深的教育心理學家。請根據以下學生的錯題紀錄，進行「極簡短」的診斷。

背景：國小 {grade} 年級 {subject}（{unit}）
錯題紀錄：
{details}
**輸出要求 (CRITICAL)**：
請務必精簡，讓教師能在 10 秒內（約 30-50 字）快速掌握重點。
請直接使用以下格式列點：
1. 核心迷思：(一句話點出最關鍵的錯誤觀念)
2. 教學建議：(一句話提供具體作法)"#,
        grade = config.grade,
        subject = config.subject.label(),
        unit = config.unit,
        details = details,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{AssessmentType, Subject};

    fn config() -> QuizConfig {
        QuizConfig {
            subject: Subject::Math,
            grade: 3,
            unit: "分數的加減".to_string(),
            assess_type: AssessmentType::Diagnostic,
        }
    }

    fn reply_with(count: usize) -> String {
        let items: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"q":"題目 {n}","options":["甲","乙","丙","丁"],"ans":{ans},"explanation":"解析 {n}","bloomLevel":"理解"}}"#,
                    n = i + 1,
                    ans = i % 4,
                )
            })
            .collect();
        format!("[{}]", items.join(","))
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  [1]  "), "[1]");
        assert_eq!(strip_code_fences("[1]"), "[1]");
    }

    #[test]
    fn well_formed_reply_parses() {
        let questions = parse_questions(&reply_with(5)).expect("reply should parse");
        assert_eq!(questions.len(), 5);
        assert_eq!(questions[0].text, "題目 1");
        assert_eq!(questions[3].ans, 3);
    }

    #[test]
    fn fenced_reply_parses() {
        let fenced = format!("```json\n{}\n```", reply_with(5));
        assert!(parse_questions(&fenced).is_ok());
    }

    #[test]
    fn wrong_count_is_rejected() {
        assert!(matches!(
            parse_questions(&reply_with(4)),
            Err(GenerationError::WrongCount(4))
        ));
        assert!(matches!(
            parse_questions(&reply_with(6)),
            Err(GenerationError::WrongCount(6))
        ));
    }

    #[test]
    fn prose_is_rejected() {
        assert!(matches!(
            parse_questions("抱歉，我無法出題。"),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn out_of_range_answer_is_rejected() {
        let mut reply = reply_with(5);
        reply = reply.replacen("\"ans\":0", "\"ans\":4", 1);
        assert!(matches!(
            parse_questions(&reply),
            Err(GenerationError::AnswerOutOfRange(4))
        ));
    }

    #[test]
    fn question_prompt_pins_grade_and_policy() {
        let prompt = build_question_prompt(&config());
        assert!(prompt.contains("國小 3 年級"));
        assert!(prompt.contains("絕對禁止"));
        assert!(prompt.contains("4 年級以上才教的概念"));
        assert!(prompt.contains("數學"));
        assert!(prompt.contains("分數的加減"));
        assert!(prompt.contains("出 5 題"));
        assert!(prompt.contains("診斷性評量"));
        assert!(prompt.contains("這是盲測"));
        assert!(prompt.contains("Unicode 符號"));
        assert!(prompt.contains("High Distractor Power"));
    }

    #[test]
    fn diagnosis_prompt_lists_every_mistake() {
        let question = Question {
            text: "½ + ¼ = ?".to_string(),
            options: ["¾", "½", "⅙", "1"].map(str::to_string),
            ans: 0,
            explanation: "通分後再相加。".to_string(),
            bloom_level: "應用".to_string(),
        };
        let record = AnswerRecord {
            question,
            chosen: 2,
            answer: 0,
            is_correct: false,
        };
        let mistakes = vec![&record];
        let prompt = build_diagnosis_prompt(&config(), &mistakes);
        assert!(prompt.contains("錯題 1: 題目[½ + ¼ = ?] 誤選[⅙] 正解[¾]"));
        assert!(prompt.contains("國小 3 年級 數學（分數的加減）"));
        assert!(prompt.contains("核心迷思"));
        assert!(prompt.contains("教學建議"));
    }
}
