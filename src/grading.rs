// src/grading.rs
//
// Pure grading rules. Persistence of the verdicts happens in the submit
// handler's transaction; nothing here touches the database.

use std::collections::BTreeSet;

use crate::models::quiz::{QuestionType, QuestionWithOptions};

/// The participant's selection for one question, normalized for grading.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub option_ids: Vec<i64>,
    pub answer_bool: Option<bool>,
}

/// Decides whether a participant's selection answers a question correctly.
///
/// SINGLE_CHOICE: correct iff the single correct option is the single selected
/// one. A question with no correct option and no selection counts as correct
/// (vacuous match); no selection against an existing correct option is wrong,
/// not abstained.
/// MULTI_CHOICE: exact set equality, no partial credit.
/// TRUE_FALSE: equal non-null booleans; both null matches vacuously; one null
/// is wrong.
pub fn determine_correctness(question: &QuestionWithOptions, selection: &Selection) -> bool {
    match question.question.question_type {
        QuestionType::SingleChoice => {
            let correct: BTreeSet<i64> = question.correct_option_ids().into_iter().collect();
            let selected: BTreeSet<i64> = selection.option_ids.iter().copied().collect();
            if correct.len() == 1 && selected.len() == 1 {
                selected == correct
            } else {
                correct.is_empty() && selected.is_empty()
            }
        }
        QuestionType::MultiChoice => {
            let correct: BTreeSet<i64> = question.correct_option_ids().into_iter().collect();
            let selected: BTreeSet<i64> = selection.option_ids.iter().copied().collect();
            selected == correct
        }
        QuestionType::TrueFalse => {
            match (selection.answer_bool, question.question.correct_answer_bool) {
                (Some(selected), Some(correct)) => selected == correct,
                (None, None) => true,
                _ => false,
            }
        }
    }
}

/// Sums `points` over the answers graded correct. This is the attempt's score
/// of record.
pub fn calculate_score<I>(graded: I) -> f64
where
    I: IntoIterator<Item = (f64, bool)>,
{
    graded
        .into_iter()
        .filter(|(_, is_correct)| *is_correct)
        .map(|(points, _)| points)
        .sum()
}
