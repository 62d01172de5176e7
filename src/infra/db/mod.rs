//! Postgres-backed repository implementations.

mod questions;
mod types;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::QuestionQueryFilter;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(pool).await
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn apply_question_filter<'q>(
        qb: &mut QueryBuilder<'q, Postgres>,
        filter: &'q QuestionQueryFilter,
    ) {
        if let Some(search) = filter.search.as_ref() {
            let pattern = util::contains_pattern(search);
            qb.push(" AND (q.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(r" ESCAPE '\' OR q.content ILIKE ");
            qb.push_bind(pattern);
            qb.push(r" ESCAPE '\')");
        }

        if filter.unanswered {
            qb.push(" AND NOT EXISTS (SELECT 1 FROM answers x WHERE x.question_id = q.question_id)");
        }
    }
}
