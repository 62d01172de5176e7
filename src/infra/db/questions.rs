use async_trait::async_trait;
use sqlx::QueryBuilder;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreateAnswerParams, CreateQuestionParams, QuestionQueryFilter, QuestionsRepo,
    QuestionsWriteRepo, RepoError, UpdateQuestionParams,
};
use crate::domain::aggregate::JoinedRow;
use crate::domain::entities::AnswerRecord;

use super::PostgresRepositories;
use super::types::{AnswerRow, QuestionAnswerRow};
use crate::infra::db::map_sqlx_error;

const ANSWER_COLUMNS: &str = "a.answer_id, a.question_id AS answer_question_id, \
     a.content AS answer_content, a.user_id AS answer_user_id, \
     a.user_name AS answer_user_name, a.created AS answer_created";

const NULL_ANSWER_COLUMNS: &str = "NULL::INTEGER AS answer_id, NULL::INTEGER AS answer_question_id, \
     NULL::TEXT AS answer_content, NULL::VARCHAR AS answer_user_id, \
     NULL::VARCHAR AS answer_user_name, NULL::TIMESTAMPTZ AS answer_created";

#[async_trait]
impl QuestionsRepo for PostgresRepositories {
    async fn fetch_single(&self, question_id: i32) -> Result<Vec<JoinedRow>, RepoError> {
        let sql = format!(
            "SELECT q.question_id, q.title, q.content, q.user_id, q.user_name, q.created, \
             {ANSWER_COLUMNS} \
             FROM questions q \
             LEFT JOIN answers a ON a.question_id = q.question_id \
             WHERE q.question_id = $1 \
             ORDER BY a.created, a.answer_id"
        );

        let rows = sqlx::query_as::<_, QuestionAnswerRow>(&sql)
            .bind(question_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Err(RepoError::NotFound);
        }

        Ok(rows.into_iter().map(JoinedRow::from).collect())
    }

    async fn fetch_many(
        &self,
        filter: &QuestionQueryFilter,
        page: PageRequest,
    ) -> Result<Vec<JoinedRow>, RepoError> {
        // Page over questions first so that answers never split a page.
        let mut qb = QueryBuilder::new(
            "WITH page AS (\
             SELECT q.question_id, q.title, q.content, q.user_id, q.user_name, q.created \
             FROM questions q WHERE 1=1",
        );
        Self::apply_question_filter(&mut qb, filter);
        qb.push(" ORDER BY q.created DESC, q.question_id DESC LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());
        qb.push(") SELECT p.question_id, p.title, p.content, p.user_id, p.user_name, p.created, ");

        if filter.include_answers {
            qb.push(ANSWER_COLUMNS);
            qb.push(
                " FROM page p LEFT JOIN answers a ON a.question_id = p.question_id \
                 ORDER BY p.created DESC, p.question_id DESC, a.created, a.answer_id",
            );
        } else {
            qb.push(NULL_ANSWER_COLUMNS);
            qb.push(" FROM page p ORDER BY p.created DESC, p.question_id DESC");
        }

        let rows = qb
            .build_query_as::<QuestionAnswerRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(JoinedRow::from).collect())
    }

    async fn question_exists(&self, question_id: i32) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM questions WHERE question_id = $1)",
        )
        .bind(question_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn find_answer(&self, answer_id: i32) -> Result<Option<AnswerRecord>, RepoError> {
        let row = sqlx::query_as::<_, AnswerRow>(
            "SELECT answer_id, question_id, content, user_id, user_name, created \
             FROM answers WHERE answer_id = $1",
        )
        .bind(answer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AnswerRecord::from))
    }
}

#[async_trait]
impl QuestionsWriteRepo for PostgresRepositories {
    async fn create_question(&self, params: CreateQuestionParams) -> Result<i32, RepoError> {
        sqlx::query_scalar::<_, i32>(
            "INSERT INTO questions (title, content, user_id, user_name, created) \
             VALUES ($1, $2, $3, $4, $5) RETURNING question_id",
        )
        .bind(params.title)
        .bind(params.content)
        .bind(params.user_id)
        .bind(params.user_name)
        .bind(params.created)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn update_question(&self, params: UpdateQuestionParams) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE questions SET title = $2, content = $3 WHERE question_id = $1",
        )
        .bind(params.question_id)
        .bind(params.title)
        .bind(params.content)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_question(&self, question_id: i32) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM questions WHERE question_id = $1")
            .bind(question_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn create_answer(&self, params: CreateAnswerParams) -> Result<AnswerRecord, RepoError> {
        let row = sqlx::query_as::<_, AnswerRow>(
            "INSERT INTO answers (question_id, content, user_id, user_name, created) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING answer_id, question_id, content, user_id, user_name, created",
        )
        .bind(params.question_id)
        .bind(params.content)
        .bind(params.user_id)
        .bind(params.user_name)
        .bind(params.created)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(AnswerRecord::from(row))
    }
}
