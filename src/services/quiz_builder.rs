use rand::Rng;
use tracing::{info, warn};

use crate::{
    dao::question_bank::QuestionBank,
    state::round::{Question, QuizSet},
};

/// Sample `num_questions` distinct questions from the bank.
///
/// Draws from a shrinking pool of bank indices so a repeat is impossible and
/// the loop always terminates. A request larger than the bank is clamped.
pub fn build_quiz_set<R: Rng + ?Sized>(
    bank: &QuestionBank,
    num_questions: usize,
    rng: &mut R,
) -> QuizSet {
    let available = bank.len();
    let count = if num_questions > available {
        warn!(
            requested = num_questions,
            available, "round length exceeds the question bank; using every question"
        );
        available
    } else {
        num_questions
    };

    let mut pool: Vec<usize> = (0..available).collect();
    let mut questions: Vec<Question> = Vec::with_capacity(count);
    while questions.len() < count && !pool.is_empty() {
        let pick = rng.random_range(0..pool.len());
        let bank_index = pool.swap_remove(pick);
        if let Some(question) = bank.get(bank_index) {
            questions.push(question.clone());
        }
    }

    info!(questions = questions.len(), "quiz set built");
    QuizSet::new(questions)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn bank(size: usize) -> QuestionBank {
        QuestionBank::from_questions(
            (0..size)
                .map(|i| Question {
                    bank_index: 0,
                    category: "Cat".into(),
                    prompt: format!("Question {i}?"),
                    accepted_answers: vec![format!("answer {i}")],
                    grouping: None,
                })
                .collect(),
        )
    }

    #[test]
    fn never_repeats_a_question() {
        let bank = bank(20);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let quiz = build_quiz_set(&bank, 10, &mut rng);
            let indices = quiz.bank_indices();
            assert_eq!(indices.len(), 10);
            assert_eq!(indices.iter().collect::<HashSet<_>>().len(), 10);
        }
    }

    #[test]
    fn clamps_to_bank_size() {
        let bank = bank(5);
        let mut rng = StdRng::seed_from_u64(3);
        let quiz = build_quiz_set(&bank, 12, &mut rng);

        let mut indices = quiz.bank_indices();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn empty_request_yields_empty_set() {
        let bank = bank(5);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(build_quiz_set(&bank, 0, &mut rng).is_empty());
    }
}
