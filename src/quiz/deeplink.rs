//! Shareable practice links.
//!
//! Telegram delivers `t.me/<bot>?start=<payload>` payloads as the text of a
//! `/start` command, limited to 64 characters of `[A-Za-z0-9_-]`, so the
//! configuration is packed as url-safe base64 over a `|`-separated record.
//! The unit keyword goes last and may therefore contain the separator.

use std::fmt::{self, Display};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::quiz::{AssessmentType, QuizConfig, Subject, GRADES};

/// Telegram's hard limit on `start` payload length.
pub const MAX_PAYLOAD: usize = 64;

/// Role marker for student links, the only role links carry today.
const STUDENT_ROLE: &str = "s";

const SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepLinkError {
    /// Payload is not url-safe base64 over UTF-8 text.
    Encoding,
    /// Wrong number of packed fields, or an empty unit.
    Shape,
    /// Unknown role marker.
    Role,
    /// Unknown subject code.
    Subject,
    /// Grade missing or outside the covered range.
    Grade,
    /// Unknown assessment-type code.
    AssessType,
}

impl Display for DeepLinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DeepLinkError::Encoding => "payload is not base64-packed UTF-8",
            DeepLinkError::Shape => "payload does not pack all five fields",
            DeepLinkError::Role => "unknown role marker",
            DeepLinkError::Subject => "unknown subject code",
            DeepLinkError::Grade => "grade is outside the covered range",
            DeepLinkError::AssessType => "unknown assessment type code",
        };
        write!(f, "{reason}")
    }
}

pub fn encode(config: &QuizConfig) -> String {
    let packed = format!(
        "{STUDENT_ROLE}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
        config.subject.code(),
        config.grade,
        config.assess_type.code(),
        config.unit,
    );
    URL_SAFE_NO_PAD.encode(packed)
}

pub fn parse(payload: &str) -> Result<QuizConfig, DeepLinkError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim())
        .map_err(|_| DeepLinkError::Encoding)?;
    let packed = String::from_utf8(bytes).map_err(|_| DeepLinkError::Encoding)?;

    let mut fields = packed.splitn(5, SEPARATOR);
    let role = fields.next().ok_or(DeepLinkError::Shape)?;
    let subject = fields.next().ok_or(DeepLinkError::Shape)?;
    let grade = fields.next().ok_or(DeepLinkError::Shape)?;
    let assess_type = fields.next().ok_or(DeepLinkError::Shape)?;
    let unit = fields.next().ok_or(DeepLinkError::Shape)?;

    if role != STUDENT_ROLE {
        return Err(DeepLinkError::Role);
    }
    let subject = Subject::from_code(subject).ok_or(DeepLinkError::Subject)?;
    let grade: u8 = grade.parse().map_err(|_| DeepLinkError::Grade)?;
    if !GRADES.contains(&grade) {
        return Err(DeepLinkError::Grade);
    }
    let assess_type = AssessmentType::from_code(assess_type).ok_or(DeepLinkError::AssessType)?;
    if unit.is_empty() {
        return Err(DeepLinkError::Shape);
    }

    Ok(QuizConfig {
        subject,
        grade,
        unit: unit.to_string(),
        assess_type,
    })
}

/// Builds the shareable link, or `None` when the packed payload would not
/// fit Telegram's limit (overly long unit keywords).
pub fn practice_link(bot_username: &str, config: &QuizConfig) -> Option<String> {
    let payload = encode(config);
    if payload.len() > MAX_PAYLOAD {
        return None;
    }
    Some(format!("https://t.me/{bot_username}?start={payload}"))
}
