use time::OffsetDateTime;

use crate::domain::aggregate::{JoinedRow, QuestionRow};
use crate::domain::entities::AnswerRecord;

/// One row of the questions LEFT JOIN answers query. Answer columns are NULL
/// for questions without answers.
#[derive(sqlx::FromRow)]
pub(crate) struct QuestionAnswerRow {
    pub(crate) question_id: i32,
    pub(crate) title: String,
    pub(crate) content: String,
    pub(crate) user_id: String,
    pub(crate) user_name: String,
    pub(crate) created: OffsetDateTime,
    pub(crate) answer_id: Option<i32>,
    pub(crate) answer_question_id: Option<i32>,
    pub(crate) answer_content: Option<String>,
    pub(crate) answer_user_id: Option<String>,
    pub(crate) answer_user_name: Option<String>,
    pub(crate) answer_created: Option<OffsetDateTime>,
}

impl From<QuestionAnswerRow> for JoinedRow {
    fn from(row: QuestionAnswerRow) -> Self {
        let QuestionAnswerRow {
            question_id,
            title,
            content,
            user_id,
            user_name,
            created,
            answer_id,
            answer_question_id,
            answer_content,
            answer_user_id,
            answer_user_name,
            answer_created,
        } = row;

        let answer = match (
            answer_id,
            answer_question_id,
            answer_content,
            answer_user_id,
            answer_user_name,
            answer_created,
        ) {
            (
                Some(answer_id),
                Some(question_id),
                Some(content),
                Some(user_id),
                Some(user_name),
                Some(created),
            ) => Some(AnswerRecord {
                answer_id,
                question_id,
                content,
                user_id,
                user_name,
                created,
            }),
            _ => None,
        };

        JoinedRow::new(
            QuestionRow {
                question_id,
                title,
                content,
                user_id,
                user_name,
                created,
            },
            answer,
        )
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AnswerRow {
    pub(crate) answer_id: i32,
    pub(crate) question_id: i32,
    pub(crate) content: String,
    pub(crate) user_id: String,
    pub(crate) user_name: String,
    pub(crate) created: OffsetDateTime,
}

impl From<AnswerRow> for AnswerRecord {
    fn from(row: AnswerRow) -> Self {
        Self {
            answer_id: row.answer_id,
            question_id: row.question_id,
            content: row.content,
            user_id: row.user_id,
            user_name: row.user_name,
            created: row.created,
        }
    }
}
