//! Reconstruction of question aggregates from flat joined rows.
//!
//! Storage returns one row per (question, answer) pair, with the question
//! columns repeated for every answer and a missing answer for questions that
//! have none. [`reduce`] folds those rows back into one [`QuestionAggregate`]
//! per question in a single pass. Rows for the same question do not need to
//! be contiguous.

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;
use time::OffsetDateTime;

use super::entities::{AnswerRecord, QuestionAggregate};

/// Question-level columns of a joined row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRow {
    pub question_id: i32,
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    pub created: OffsetDateTime,
}

/// One row of a question/answer join. `answer` is `None` when the question
/// has no answers (or when the query did not join answers at all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub question: QuestionRow,
    pub answer: Option<AnswerRecord>,
}

impl JoinedRow {
    pub fn new(question: QuestionRow, answer: Option<AnswerRecord>) -> Self {
        Self { question, answer }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error(
        "answer {answer_id} references question {question_id} but arrived with question {row_question_id}"
    )]
    OrphanAnswer {
        answer_id: i32,
        question_id: i32,
        row_question_id: i32,
    },
}

/// Output of [`reduce`]: the aggregates in first-appearance order plus every
/// malformed row that was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reduction {
    pub aggregates: Vec<QuestionAggregate>,
    pub errors: Vec<ReduceError>,
}

impl Reduction {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// First aggregate of the batch, for single-question fetches.
    pub fn into_first(self) -> Option<QuestionAggregate> {
        self.aggregates.into_iter().next()
    }
}

impl From<QuestionRow> for QuestionAggregate {
    fn from(row: QuestionRow) -> Self {
        Self {
            question_id: row.question_id,
            title: row.title,
            content: row.content,
            user_id: row.user_id,
            user_name: row.user_name,
            created: row.created,
            answers: Vec::new(),
        }
    }
}

/// Fold joined rows into question aggregates.
///
/// Each question appears once, ordered by its first row. Answers are kept in
/// encounter order; an `answer_id` repeated within one question is attached
/// only once. An answer
/// whose `question_id` disagrees with the question it was joined to is
/// dropped and reported in [`Reduction::errors`].
pub fn reduce<I>(rows: I) -> Reduction
where
    I: IntoIterator<Item = JoinedRow>,
{
    let mut aggregates: IndexMap<i32, QuestionAggregate> = IndexMap::new();
    let mut seen_answers: HashSet<(i32, i32)> = HashSet::new();
    let mut errors = Vec::new();

    for JoinedRow { question, answer } in rows {
        let question_id = question.question_id;
        let aggregate = aggregates
            .entry(question_id)
            .or_insert_with(|| QuestionAggregate::from(question));

        let Some(answer) = answer else {
            continue;
        };

        if answer.question_id != question_id {
            errors.push(ReduceError::OrphanAnswer {
                answer_id: answer.answer_id,
                question_id: answer.question_id,
                row_question_id: question_id,
            });
            continue;
        }

        if seen_answers.insert((question_id, answer.answer_id)) {
            aggregate.answers.push(answer);
        }
    }

    Reduction {
        aggregates: aggregates.into_values().collect(),
        errors,
    }
}
