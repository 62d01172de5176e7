//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub answer_id: i32,
    pub question_id: i32,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

/// A question together with every answer attached to it.
///
/// `answers` keeps the order in which answers were reduced from storage rows
/// and is empty, never absent, for unanswered questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionAggregate {
    pub question_id: i32,
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub answers: Vec<AnswerRecord>,
}

impl QuestionAggregate {
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
