//! Decides whether a chat line answers the open question.

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

/// Closeness allowed when no hint has been shown.
pub const BASE_TOLERANCE: f64 = 0.4;
/// Tolerance removed for every hint shown.
pub const HINT_PENALTY: f64 = 0.15;

/// Which rule decides that a candidate matches an accepted answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Edit distance ratio, tightening as hints are revealed.
    #[default]
    Fuzzy,
    /// Case-insensitive whole-word occurrence of the answer in the raw message.
    Literal,
}

/// Answer comparison with a tolerance that depends on the hints already shown.
#[derive(Debug, Clone, Copy)]
pub struct AnswerMatcher {
    policy: MatchPolicy,
    base_tolerance: f64,
    hint_penalty: f64,
}

impl Default for AnswerMatcher {
    fn default() -> Self {
        Self::new(MatchPolicy::default())
    }
}

impl AnswerMatcher {
    /// Matcher using the reference tolerance constants.
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            base_tolerance: BASE_TOLERANCE,
            hint_penalty: HINT_PENALTY,
        }
    }

    /// Active policy.
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Maximum closeness (exclusive) accepted after `hints_revealed` hints.
    pub fn tolerance(&self, hints_revealed: u8) -> f64 {
        self.base_tolerance - self.hint_penalty * f64::from(hints_revealed)
    }

    /// Whether `candidate` matches `answer` after `hints_revealed` hints.
    pub fn matches(&self, candidate: &str, answer: &str, hints_revealed: u8) -> bool {
        match self.policy {
            MatchPolicy::Fuzzy => self.fuzzy_match(candidate, answer, hints_revealed),
            MatchPolicy::Literal => literal_match(candidate, answer),
        }
    }

    /// Whether `candidate` matches any of the accepted answers.
    pub fn matches_any<'a, I>(&self, candidate: &str, answers: I, hints_revealed: u8) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        answers
            .into_iter()
            .any(|answer| self.matches(candidate, answer, hints_revealed))
    }

    fn fuzzy_match(&self, candidate: &str, answer: &str, hints_revealed: u8) -> bool {
        let Some(ratio) = closeness(candidate, answer) else {
            return false;
        };
        let tolerance = self.tolerance(hints_revealed);
        debug!(ratio, tolerance, "compared candidate answer");
        ratio < tolerance
    }
}

/// Lowercase and collapse every whitespace run into a single space.
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Edit distance between candidate and answer divided by the answer length.
///
/// Returns `None` for an empty answer, which can never be matched.
pub fn closeness(candidate: &str, answer: &str) -> Option<f64> {
    let answer = normalize(answer);
    let length = answer.chars().count();
    if length == 0 {
        return None;
    }
    let distance = strsim::osa_distance(&normalize(candidate), &answer);
    Some(distance as f64 / length as f64)
}

fn literal_match(candidate: &str, answer: &str) -> bool {
    let answer = answer.trim();
    if answer.is_empty() {
        return false;
    }
    let pattern = format!(
        "(?i){}{}{}",
        word_boundary(answer.chars().next()),
        regex::escape(answer),
        word_boundary(answer.chars().next_back()),
    );
    match Regex::new(&pattern) {
        Ok(pattern) => pattern.is_match(candidate),
        Err(err) => {
            debug!(error = %err, "answer cannot be compiled into a pattern");
            false
        }
    }
}

/// `\b` when the answer edge is a word character; punctuation needs no guard.
fn word_boundary(edge: Option<char>) -> &'static str {
    match edge {
        Some(c) if c.is_alphanumeric() || c == '_' => r"\b",
        _ => "",
    }
}
