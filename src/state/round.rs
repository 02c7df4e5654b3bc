use std::time::Instant;

use crate::dao::models::{QuestionEntity, RoundEntity};

/// Points awarded per question outside of bonus mode.
pub const BASE_POINT_VALUE: u32 = 1;

/// Immutable question record loaded from the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Position of the question inside the bank, used for uniqueness.
    pub bank_index: usize,
    /// Category shown between brackets when the question is asked.
    pub category: String,
    /// Question text.
    pub prompt: String,
    /// Accepted answers; never empty for questions coming from the bank.
    pub accepted_answers: Vec<String>,
    /// Opaque grouping tag.
    pub grouping: Option<String>,
}

impl Question {
    /// Canonical answer announced in chat.
    pub fn answer(&self) -> Option<&str> {
        self.accepted_answers.first().map(String::as_str)
    }
}

/// Ordered questions selected for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizSet {
    questions: Vec<Question>,
}

impl QuizSet {
    /// Wrap an already sampled question sequence.
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Number of questions in the round.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the round has no question at all.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Iterate over the questions in play order.
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Bank indices of the questions in play order.
    pub fn bank_indices(&self) -> Vec<usize> {
        self.questions.iter().map(|q| q.bank_index).collect()
    }
}

/// Mutable per-round bookkeeping owned by the session engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    /// Index of the current question inside the quiz set.
    pub current_question_index: usize,
    /// When the open question was asked.
    pub question_asked_at: Option<Instant>,
    /// Hints shown for the current question (0, 1 or 2).
    pub hints_revealed: u8,
    /// Points credited for a correct answer.
    pub current_point_value: u32,
    /// Whether the bonus mode is on.
    pub bonus: bool,
}

impl Default for RoundState {
    fn default() -> Self {
        Self {
            current_question_index: 0,
            question_asked_at: None,
            hints_revealed: 0,
            current_point_value: BASE_POINT_VALUE,
            bonus: false,
        }
    }
}

impl RoundState {
    /// Forget the timing context of the current question.
    pub fn clear_question(&mut self) {
        self.question_asked_at = None;
        self.hints_revealed = 0;
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            bank_index: value.bank_index,
            category: value.category,
            prompt: value.prompt,
            accepted_answers: value.answers,
            grouping: value.grouping,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            bank_index: value.bank_index,
            category: value.category,
            prompt: value.prompt,
            answers: value.accepted_answers,
            grouping: value.grouping,
        }
    }
}

impl From<Vec<QuestionEntity>> for QuizSet {
    fn from(value: Vec<QuestionEntity>) -> Self {
        Self::new(value.into_iter().map(Into::into).collect())
    }
}

impl From<QuizSet> for Vec<QuestionEntity> {
    fn from(value: QuizSet) -> Self {
        value.questions.into_iter().map(Into::into).collect()
    }
}

impl From<RoundEntity> for RoundState {
    fn from(value: RoundEntity) -> Self {
        Self {
            current_question_index: value.question_index,
            question_asked_at: None,
            hints_revealed: 0,
            current_point_value: value.point_value.max(BASE_POINT_VALUE),
            bonus: value.bonus,
        }
    }
}
