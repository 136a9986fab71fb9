//! Per-attempt answer session. Handlers own a [`QuizSession`] by value
//! inside the dialogue state and drive it through `submit` and `advance`;
//! every mutation keeps the pending selection, the revealed flag and the
//! history in lockstep.

use crate::quiz::{AnswerRecord, Question, QuizConfig};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuizSession {
    pub config: QuizConfig,
    /// Student name collected on the welcome screen; `None` on self-tests.
    pub student: Option<String>,
    /// Whether this attempt was opened through a practice link.
    pub via_link: bool,
    pub questions: Vec<Question>,
    /// Index of the question currently on screen.
    pub current: usize,
    /// Selection submitted for the current question, if any.
    pub selected: Option<u8>,
    /// Whether the current question's explanation has been revealed.
    /// Set only together with `selected`.
    pub revealed: bool,
    pub history: Vec<AnswerRecord>,
    /// Teacher-facing diagnosis; the empty string means "not computed yet".
    pub diagnosis: String,
}

/// What [`QuizSession::submit`] did with an incoming selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// Selection recorded; the explanation may now be shown.
    Revealed { correct: bool },
    /// The current question was already answered; nothing changed.
    AlreadyAnswered,
    /// No question left to answer; nothing changed.
    Exhausted,
}

/// What [`QuizSession::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Nothing submitted for the current question; nothing changed.
    Pending,
    /// Moved on to the next question.
    Next,
    /// The last record was appended; the attempt is complete.
    Finished,
}

/// Whether the result screen still owes the teacher a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisNeed {
    /// Already stored for this attempt.
    Done,
    /// Nothing to diagnose; store the static all-clear text.
    NoMistakes,
    /// Mistakes exist and no diagnosis yet; consult the examiner once.
    Consult,
}

impl QuizSession {
    pub fn begin(
        config: QuizConfig,
        student: Option<String>,
        via_link: bool,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            config,
            student,
            via_link,
            questions,
            current: 0,
            selected: None,
            revealed: false,
            history: Vec::new(),
            diagnosis: String::new(),
        }
    }

    /// Restarts the same topic with a fresh question set, keeping who is
    /// taking it and how they got here.
    pub fn renew(self, questions: Vec<Question>) -> Self {
        Self::begin(self.config, self.student, self.via_link, questions)
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    /// True once every question has been advanced past, including the
    /// degenerate empty set.
    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }

    pub fn submit(&mut self, choice: u8) -> Submit {
        if self.revealed {
            return Submit::AlreadyAnswered;
        }
        let question = match self.current_question() {
            Some(question) => question,
            None => return Submit::Exhausted,
        };
        let correct = choice == question.ans;
        self.selected = Some(choice);
        self.revealed = true;
        Submit::Revealed { correct }
    }

    pub fn advance(&mut self) -> Advance {
        let (chosen, question) = match (self.selected, self.current_question()) {
            (Some(chosen), Some(question)) => (chosen, question.clone()),
            _ => return Advance::Pending,
        };
        self.history.push(AnswerRecord {
            chosen,
            answer: question.ans,
            is_correct: chosen == question.ans,
            question,
        });
        self.current += 1;
        self.selected = None;
        self.revealed = false;
        if self.is_finished() {
            Advance::Finished
        } else {
            Advance::Next
        }
    }

    pub fn correct_count(&self) -> usize {
        self.history.iter().filter(|record| record.is_correct).count()
    }

    pub fn mistakes(&self) -> Vec<&AnswerRecord> {
        self.history.iter().filter(|record| !record.is_correct).collect()
    }

    pub fn diagnosis_need(&self) -> DiagnosisNeed {
        if !self.diagnosis.is_empty() {
            DiagnosisNeed::Done
        } else if self.mistakes().is_empty() {
            DiagnosisNeed::NoMistakes
        } else {
            DiagnosisNeed::Consult
        }
    }
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

    fn questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| Question {
                text: format!("第 {} 題", i + 1),
                options: ["甲", "乙", "丙", "丁"].map(str::to_string),
                ans: (i % 4) as u8,
                explanation: format!("解析 {}", i + 1),
                bloom_level: "理解".to_string(),
            })
            .collect()
    }

    fn session() -> QuizSession {
        QuizSession::begin(config(), None, false, questions(5))
    }

    #[test]
    fn fresh_session_starts_clean() {
        let session = session();
        assert_eq!(session.current, 0);
        assert_eq!(session.selected, None);
        assert!(!session.revealed);
        assert!(session.history.is_empty());
        assert!(session.diagnosis.is_empty());
        assert!(!session.is_finished());
        assert_eq!(session.total(), 5);
    }

    #[test]
    fn submit_reveals_and_reports_correctness() {
        let mut session = session();
        assert_eq!(session.submit(0), Submit::Revealed { correct: true });
        assert!(session.revealed);
        assert_eq!(session.selected, Some(0));

        let mut session = self::session();
        assert_eq!(session.submit(2), Submit::Revealed { correct: false });
    }

    #[test]
    fn second_submission_is_rejected() {
        let mut session = session();
        session.submit(2);
        assert_eq!(session.submit(0), Submit::AlreadyAnswered);
        // The first selection stands.
        assert_eq!(session.selected, Some(2));
        assert!(session.history.is_empty());
    }

    #[test]
    fn advance_without_submission_changes_nothing() {
        let mut session = session();
        assert_eq!(session.advance(), Advance::Pending);
        assert_eq!(session.current, 0);
        assert!(session.history.is_empty());
    }

    #[test]
    fn reveal_always_implies_a_selection() {
        let mut session = session();
        for _ in 0..session.total() {
            assert!(!session.revealed && session.selected.is_none());
            session.submit(1);
            assert!(session.revealed && session.selected.is_some());
            session.advance();
        }
        assert!(!session.revealed && session.selected.is_none());
    }

    #[test]
    fn history_stays_in_lockstep_with_position() {
        let mut session = session();
        for i in 0..4 {
            session.submit(session.questions[session.current].ans);
            assert_eq!(session.advance(), Advance::Next);
            assert_eq!(session.history.len(), session.current);
            assert_eq!(session.current, i + 1);
        }
        session.submit(0);
        assert_eq!(session.advance(), Advance::Finished);
        assert!(session.is_finished());
        assert_eq!(session.history.len(), 5);

        // Stray input after the end never grows the history.
        assert_eq!(session.submit(0), Submit::Exhausted);
        assert_eq!(session.advance(), Advance::Pending);
        assert_eq!(session.history.len(), 5);
    }

    #[test]
    fn records_keep_the_graded_outcome() {
        let mut session = session();
        session.submit(session.questions[0].ans);
        session.advance();
        session.submit(3);
        session.advance();

        assert!(session.history[0].is_correct);
        assert!(!session.history[1].is_correct);
        assert_eq!(session.history[1].chosen, 3);
        assert_eq!(session.history[1].answer, session.history[1].question.ans);
        assert_eq!(session.correct_count(), 1);
        assert_eq!(session.mistakes().len(), 1);
    }

    #[test]
    fn empty_set_is_finished_immediately() {
        let mut session = QuizSession::begin(config(), None, true, Vec::new());
        assert!(session.is_finished());
        assert_eq!(session.current_question(), None);
        assert_eq!(session.submit(0), Submit::Exhausted);
        assert_eq!(session.advance(), Advance::Pending);
        assert_eq!(session.correct_count(), 0);
        assert_eq!(session.history.len(), 0);
    }

    #[test]
    fn renew_keeps_identity_and_resets_progress() {
        let mut session = QuizSession::begin(
            config(),
            Some("小美".to_string()),
            true,
            questions(5),
        );
        session.submit(3);
        session.advance();
        session.diagnosis = "舊診斷".to_string();

        let renewed = session.renew(questions(5));
        assert_eq!(renewed.config, config());
        assert_eq!(renewed.student.as_deref(), Some("小美"));
        assert!(renewed.via_link);
        assert_eq!(renewed.current, 0);
        assert!(renewed.history.is_empty());
        assert!(renewed.diagnosis.is_empty());
        assert!(!renewed.revealed);
    }

    #[test]
    fn diagnosis_is_owed_exactly_once() {
        // Perfect run: static all-clear, no consultation.
        let mut session = session();
        for _ in 0..5 {
            session.submit(session.questions[session.current].ans);
            session.advance();
        }
        assert_eq!(session.diagnosis_need(), DiagnosisNeed::NoMistakes);
        session.diagnosis = "表現優異".to_string();
        assert_eq!(session.diagnosis_need(), DiagnosisNeed::Done);

        // Run with mistakes: one consultation, then done.
        let mut session = self::session();
        for _ in 0..5 {
            session.submit(3);
            session.advance();
        }
        assert!(!session.mistakes().is_empty());
        assert_eq!(session.diagnosis_need(), DiagnosisNeed::Consult);
        session.diagnosis = "核心迷思：通分。".to_string();
        assert_eq!(session.diagnosis_need(), DiagnosisNeed::Done);
    }
}
