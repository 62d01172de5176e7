//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::pagination::PageRequest;
use crate::domain::aggregate::JoinedRow;
use crate::domain::entities::AnswerRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionQueryFilter {
    /// Case-insensitive match against title or content.
    pub search: Option<String>,
    /// Keep only questions without any answer.
    pub unanswered: bool,
    /// Join answers into the returned rows.
    pub include_answers: bool,
}

#[derive(Debug, Clone)]
pub struct CreateQuestionParams {
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    pub created: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct UpdateQuestionParams {
    pub question_id: i32,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CreateAnswerParams {
    pub question_id: i32,
    pub content: String,
    pub user_id: String,
    pub user_name: String,
    pub created: OffsetDateTime,
}

#[async_trait]
pub trait QuestionsRepo: Send + Sync {
    /// Joined rows for one question; at least one row when it exists.
    ///
    /// Returns [`RepoError::NotFound`] when the question does not exist.
    async fn fetch_single(&self, question_id: i32) -> Result<Vec<JoinedRow>, RepoError>;

    /// Joined rows for one page of questions, question columns repeated per answer.
    async fn fetch_many(
        &self,
        filter: &QuestionQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<JoinedRow>, RepoError>;

    async fn question_exists(&self, question_id: i32) -> Result<bool, RepoError>;

    async fn find_answer(&self, answer_id: i32) -> Result<Option<AnswerRecord>, RepoError>;
}

#[async_trait]
pub trait QuestionsWriteRepo: Send + Sync {
    async fn create_question(&self, params: CreateQuestionParams) -> Result<i32, RepoError>;

    async fn update_question(&self, params: UpdateQuestionParams) -> Result<(), RepoError>;

    async fn delete_question(&self, question_id: i32) -> Result<(), RepoError>;

    async fn create_answer(&self, params: CreateAnswerParams) -> Result<AnswerRecord, RepoError>;
}
