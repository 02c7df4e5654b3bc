//! Loader for the tabular question bank.
//!
//! The bank is a UTF-8 CSV file with a header row. Columns are read by
//! position: category, prompt, answer, alternate answer, grouping, creator.

use std::{io::Read, path::Path};

use thiserror::Error;
use tracing::{info, warn};

use crate::state::round::Question;

/// Errors raised while loading the question bank.
#[derive(Debug, Error)]
pub enum BankError {
    /// The file could not be opened or parsed as CSV.
    #[error("failed to read question bank: {0}")]
    Csv(#[from] csv::Error),
    /// The file contains no usable question.
    #[error("question bank contains no usable question")]
    Empty,
}

/// Read-only, ordered collection of questions.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Load the bank from a CSV file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let bank = Self::from_csv(reader)?;
        info!(path = %path.display(), questions = bank.len(), "question bank loaded");
        Ok(bank)
    }

    /// Parse a bank from any CSV source.
    pub fn from_reader<R: Read>(source: R) -> Result<Self, BankError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);
        Self::from_csv(reader)
    }

    /// Build a bank directly from question records, re-numbering their bank indices.
    pub fn from_questions(questions: Vec<Question>) -> Self {
        let questions = questions
            .into_iter()
            .enumerate()
            .map(|(bank_index, question)| Question {
                bank_index,
                ..question
            })
            .collect();
        Self { questions }
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, BankError> {
        let mut questions = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            match parse_row(&record, questions.len()) {
                Some(question) => questions.push(question),
                None => warn!(row = line + 1, "skipping incomplete question row"),
            }
        }

        if questions.is_empty() {
            return Err(BankError::Empty);
        }
        Ok(Self { questions })
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank is empty.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question at `index`.
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

fn non_empty(record: &csv::StringRecord, column: usize) -> Option<String> {
    record
        .get(column)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn parse_row(record: &csv::StringRecord, bank_index: usize) -> Option<Question> {
    let category = non_empty(record, 0)?;
    let prompt = non_empty(record, 1)?;
    let answer = non_empty(record, 2)?;

    let mut accepted_answers = vec![answer];
    if let Some(alternate) = non_empty(record, 3) {
        accepted_answers.push(alternate);
    }

    Some(Question {
        bank_index,
        category,
        prompt,
        accepted_answers,
        grouping: non_empty(record, 4),
    })
}
