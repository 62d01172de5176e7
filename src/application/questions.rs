//! Question read/write service.
//!
//! Reads of a single question go through the aggregate cache and fall back to
//! the store on a miss. Every successful write that changes a question's
//! aggregate removes the cached copy before returning.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{
    CreateAnswerParams, CreateQuestionParams, QuestionQueryFilter, QuestionsRepo,
    QuestionsWriteRepo, RepoError, UpdateQuestionParams,
};
use crate::cache::QuestionCache;
use crate::domain::aggregate::{Reduction, reduce};
use crate::domain::entities::{AnswerRecord, QuestionAggregate};

const SOURCE: &str = "application::questions";

pub const METRIC_REDUCE_MALFORMED_TOTAL: &str = "qanda_reduce_malformed_row_total";
pub const METRIC_STORE_FETCH_MS: &str = "qanda_store_fetch_ms";

#[derive(Debug, Error)]
pub enum QuestionServiceError {
    #[error("question not found")]
    NotFound,
    #[error("{0} must not be empty")]
    ConstraintViolation(&'static str),
    #[error("only the author may modify this question")]
    Forbidden,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Identity of the caller performing a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Clone)]
pub struct PostQuestionCommand {
    pub title: String,
    pub content: String,
}

/// Blank fields keep the stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateQuestionCommand {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostAnswerCommand {
    pub question_id: i32,
    pub content: String,
}

#[derive(Clone)]
pub struct QuestionService {
    reader: Arc<dyn QuestionsRepo>,
    writer: Arc<dyn QuestionsWriteRepo>,
    cache: Option<Arc<QuestionCache>>,
}

impl QuestionService {
    pub fn new(
        reader: Arc<dyn QuestionsRepo>,
        writer: Arc<dyn QuestionsWriteRepo>,
        cache: Option<Arc<QuestionCache>>,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
        }
    }

    /// Load one question with its answers, consulting the cache first.
    pub async fn get_question(
        &self,
        question_id: i32,
    ) -> Result<Option<Arc<QuestionAggregate>>, QuestionServiceError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(question_id) {
                return Ok(Some(cached));
            }
        }

        let Some(aggregate) = self.load_question(question_id).await? else {
            return Ok(None);
        };
        let aggregate = Arc::new(aggregate);

        if let Some(cache) = &self.cache {
            cache.set(Arc::clone(&aggregate));
        }
        Ok(Some(aggregate))
    }

    /// List a page of questions. Listing pages are not cached.
    pub async fn list_questions(
        &self,
        filter: &QuestionQueryFilter,
        page: PageRequest,
    ) -> Result<Page<QuestionAggregate>, QuestionServiceError> {
        let started_at = Instant::now();
        let rows = self.reader.fetch_many(filter, page).await?;
        histogram!(METRIC_STORE_FETCH_MS, "query" => "many")
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        let reduction = reduce(rows);
        report_malformed_rows(&reduction, "fetch_many");
        Ok(Page::new(reduction.aggregates, page))
    }

    pub async fn list_unanswered(
        &self,
        page: PageRequest,
    ) -> Result<Page<QuestionAggregate>, QuestionServiceError> {
        let filter = QuestionQueryFilter {
            unanswered: true,
            ..Default::default()
        };
        self.list_questions(&filter, page).await
    }

    pub async fn get_answer(
        &self,
        answer_id: i32,
    ) -> Result<Option<AnswerRecord>, QuestionServiceError> {
        Ok(self.reader.find_answer(answer_id).await?)
    }

    pub async fn post_question(
        &self,
        author: &Author,
        command: PostQuestionCommand,
    ) -> Result<Arc<QuestionAggregate>, QuestionServiceError> {
        ensure_non_empty(&command.title, "title")?;
        ensure_non_empty(&command.content, "content")?;

        let params = CreateQuestionParams {
            title: command.title.trim().to_string(),
            content: command.content,
            user_id: author.user_id.clone(),
            user_name: author.user_name.clone(),
            created: OffsetDateTime::now_utc(),
        };
        let question_id = self.writer.create_question(params).await?;

        let aggregate = self
            .load_question(question_id)
            .await?
            .ok_or(QuestionServiceError::NotFound)?;
        let aggregate = Arc::new(aggregate);

        if let Some(cache) = &self.cache {
            cache.set(Arc::clone(&aggregate));
        }
        debug!(target = SOURCE, question_id, "Question created");
        Ok(aggregate)
    }

    pub async fn update_question(
        &self,
        author: &Author,
        question_id: i32,
        command: UpdateQuestionCommand,
    ) -> Result<Arc<QuestionAggregate>, QuestionServiceError> {
        let existing = self.load_authored(author, question_id).await?;

        let params = UpdateQuestionParams {
            question_id,
            title: non_blank_or(command.title, existing.title),
            content: non_blank_or(command.content, existing.content),
        };
        self.writer.update_question(params).await?;
        self.invalidate(question_id);

        let updated = self
            .load_question(question_id)
            .await?
            .ok_or(QuestionServiceError::NotFound)?;
        Ok(Arc::new(updated))
    }

    pub async fn delete_question(
        &self,
        author: &Author,
        question_id: i32,
    ) -> Result<(), QuestionServiceError> {
        self.load_authored(author, question_id).await?;

        self.writer.delete_question(question_id).await?;
        self.invalidate(question_id);
        Ok(())
    }

    pub async fn post_answer(
        &self,
        author: &Author,
        command: PostAnswerCommand,
    ) -> Result<AnswerRecord, QuestionServiceError> {
        ensure_non_empty(&command.content, "content")?;

        if !self.reader.question_exists(command.question_id).await? {
            return Err(QuestionServiceError::NotFound);
        }

        let params = CreateAnswerParams {
            question_id: command.question_id,
            content: command.content,
            user_id: author.user_id.clone(),
            user_name: author.user_name.clone(),
            created: OffsetDateTime::now_utc(),
        };
        let answer = self.writer.create_answer(params).await?;
        self.invalidate(answer.question_id);
        Ok(answer)
    }

    /// Fetch straight from the store, bypassing the cache.
    async fn load_question(
        &self,
        question_id: i32,
    ) -> Result<Option<QuestionAggregate>, QuestionServiceError> {
        let started_at = Instant::now();
        let rows = match self.reader.fetch_single(question_id).await {
            Ok(rows) => rows,
            Err(RepoError::NotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        histogram!(METRIC_STORE_FETCH_MS, "query" => "single")
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        let reduction = reduce(rows);
        report_malformed_rows(&reduction, "fetch_single");
        Ok(reduction
            .aggregates
            .into_iter()
            .find(|aggregate| aggregate.question_id == question_id))
    }

    /// Authorization decisions are made against fresh store data, never the cache.
    async fn load_authored(
        &self,
        author: &Author,
        question_id: i32,
    ) -> Result<QuestionAggregate, QuestionServiceError> {
        let question = self
            .load_question(question_id)
            .await?
            .ok_or(QuestionServiceError::NotFound)?;
        if !question.is_authored_by(&author.user_id) {
            return Err(QuestionServiceError::Forbidden);
        }
        Ok(question)
    }

    fn invalidate(&self, question_id: i32) {
        if let Some(cache) = &self.cache {
            cache.remove(question_id);
        }
    }
}

fn report_malformed_rows(reduction: &Reduction, query: &'static str) {
    if reduction.is_clean() {
        return;
    }
    counter!(METRIC_REDUCE_MALFORMED_TOTAL).increment(reduction.errors.len() as u64);
    for error in &reduction.errors {
        warn!(
            target = SOURCE,
            query,
            error = %error,
            "Discarded malformed answer row"
        );
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), QuestionServiceError> {
    if value.trim().is_empty() {
        return Err(QuestionServiceError::ConstraintViolation(field));
    }
    Ok(())
}

fn non_blank_or(candidate: Option<String>, fallback: String) -> String {
    candidate
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::cache::CacheConfig;
    use crate::domain::aggregate::{JoinedRow, QuestionRow};

    #[derive(Default)]
    struct MemoryState {
        questions: BTreeMap<i32, QuestionRow>,
        answers: Vec<AnswerRecord>,
        next_id: i32,
    }

    #[derive(Default)]
    struct MemoryRepo {
        state: Mutex<MemoryState>,
        single_fetches: AtomicUsize,
    }

    impl MemoryRepo {
        fn with_question(id: i32, user_id: &str) -> Self {
            let repo = Self::default();
            {
                let mut state = repo.state.lock().unwrap();
                state.questions.insert(
                    id,
                    QuestionRow {
                        question_id: id,
                        title: "Why borrow?".into(),
                        content: "Explain borrowing".into(),
                        user_id: user_id.into(),
                        user_name: format!("{user_id}@example.com"),
                        created: datetime!(2024-01-01 00:00 UTC),
                    },
                );
                state.next_id = id + 100;
            }
            repo
        }

        fn fetches(&self) -> usize {
            self.single_fetches.load(Ordering::SeqCst)
        }

        fn rows_for(state: &MemoryState, question: &QuestionRow) -> Vec<JoinedRow> {
            let answers: Vec<_> = state
                .answers
                .iter()
                .filter(|a| a.question_id == question.question_id)
                .cloned()
                .collect();
            if answers.is_empty() {
                return vec![JoinedRow::new(question.clone(), None)];
            }
            answers
                .into_iter()
                .map(|a| JoinedRow::new(question.clone(), Some(a)))
                .collect()
        }
    }

    #[async_trait]
    impl QuestionsRepo for MemoryRepo {
        async fn fetch_single(&self, question_id: i32) -> Result<Vec<JoinedRow>, RepoError> {
            self.single_fetches.fetch_add(1, Ordering::SeqCst);
            let state = self.state.lock().unwrap();
            let question = state.questions.get(&question_id).ok_or(RepoError::NotFound)?;
            Ok(Self::rows_for(&state, question))
        }

        async fn fetch_many(
            &self,
            filter: &QuestionQueryFilter,
            _page: PageRequest,
        ) -> Result<Vec<JoinedRow>, RepoError> {
            let state = self.state.lock().unwrap();
            let mut rows = Vec::new();
            for question in state.questions.values() {
                let question_rows = Self::rows_for(&state, question);
                let answered = question_rows.iter().any(|row| row.answer.is_some());
                if filter.unanswered && answered {
                    continue;
                }
                rows.extend(question_rows);
            }
            Ok(rows)
        }

        async fn question_exists(&self, question_id: i32) -> Result<bool, RepoError> {
            Ok(self.state.lock().unwrap().questions.contains_key(&question_id))
        }

        async fn find_answer(&self, answer_id: i32) -> Result<Option<AnswerRecord>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state.answers.iter().find(|a| a.answer_id == answer_id).cloned())
        }
    }

    #[async_trait]
    impl QuestionsWriteRepo for MemoryRepo {
        async fn create_question(&self, params: CreateQuestionParams) -> Result<i32, RepoError> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state.questions.insert(
                id,
                QuestionRow {
                    question_id: id,
                    title: params.title,
                    content: params.content,
                    user_id: params.user_id,
                    user_name: params.user_name,
                    created: params.created,
                },
            );
            Ok(id)
        }

        async fn update_question(&self, params: UpdateQuestionParams) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            let question = state
                .questions
                .get_mut(&params.question_id)
                .ok_or(RepoError::NotFound)?;
            question.title = params.title;
            question.content = params.content;
            Ok(())
        }

        async fn delete_question(&self, question_id: i32) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            state.questions.remove(&question_id);
            state.answers.retain(|a| a.question_id != question_id);
            Ok(())
        }

        async fn create_answer(&self, params: CreateAnswerParams) -> Result<AnswerRecord, RepoError> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let answer = AnswerRecord {
                answer_id: state.next_id,
                question_id: params.question_id,
                content: params.content,
                user_id: params.user_id,
                user_name: params.user_name,
                created: params.created,
            };
            state.answers.push(answer.clone());
            Ok(answer)
        }
    }

    fn service(repo: &Arc<MemoryRepo>) -> QuestionService {
        let cache = Arc::new(QuestionCache::new(&CacheConfig::default()));
        QuestionService::new(repo.clone(), repo.clone(), Some(cache))
    }

    fn author(user_id: &str) -> Author {
        Author {
            user_id: user_id.into(),
            user_name: format!("{user_id}@example.com"),
        }
    }

    #[tokio::test]
    async fn repeated_reads_hit_store_once() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = service(&repo);

        let first = service.get_question(1).await.unwrap().expect("question");
        let second = service.get_question(1).await.unwrap().expect("question");

        assert_eq!(first, second);
        assert_eq!(repo.fetches(), 1);
    }

    #[tokio::test]
    async fn missing_question_is_none_and_not_cached() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(&repo);

        assert!(service.get_question(9).await.unwrap().is_none());
        assert!(service.cache.as_ref().expect("cache").get(9).is_none());
    }

    #[tokio::test]
    async fn posting_answer_invalidates_cached_question() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = service(&repo);

        let before = service.get_question(1).await.unwrap().expect("question");
        assert!(before.answers.is_empty());

        let answer = service
            .post_answer(
                &author("bob"),
                PostAnswerCommand {
                    question_id: 1,
                    content: "Use references".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(answer.user_id, "bob");

        let after = service.get_question(1).await.unwrap().expect("question");
        assert_eq!(after.answers.len(), 1);
        assert_eq!(after.answers[0].content, "Use references");
        assert_eq!(repo.fetches(), 2);
    }

    #[tokio::test]
    async fn answer_for_unknown_question_is_not_found() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(&repo);

        let result = service
            .post_answer(
                &author("bob"),
                PostAnswerCommand {
                    question_id: 404,
                    content: "Hello".into(),
                },
            )
            .await;
        assert!(matches!(result, Err(QuestionServiceError::NotFound)));
    }

    #[tokio::test]
    async fn blank_answer_is_rejected() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = service(&repo);

        let result = service
            .post_answer(
                &author("bob"),
                PostAnswerCommand {
                    question_id: 1,
                    content: "   ".into(),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(QuestionServiceError::ConstraintViolation("content"))
        ));
    }

    #[tokio::test]
    async fn posted_question_is_cached() {
        let repo = Arc::new(MemoryRepo::default());
        let service = service(&repo);

        let created = service
            .post_question(
                &author("carol"),
                PostQuestionCommand {
                    title: "  Lifetimes? ".into(),
                    content: "How do they work".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.title, "Lifetimes?");
        assert_eq!(created.user_name, "carol@example.com");
        let cached = service
            .cache
            .as_ref()
            .expect("cache")
            .get(created.question_id)
            .expect("cached after creation");
        assert_eq!(cached, created);
    }

    #[tokio::test]
    async fn update_keeps_blank_fields_and_refreshes_cache() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = service(&repo);
        service.get_question(1).await.unwrap();

        let updated = service
            .update_question(
                &author("alice"),
                1,
                UpdateQuestionCommand {
                    title: Some("Why borrow at all?".into()),
                    content: Some(String::new()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "Why borrow at all?");
        assert_eq!(updated.content, "Explain borrowing");
        assert!(service.cache.as_ref().expect("cache").get(1).is_none());

        let reread = service.get_question(1).await.unwrap().expect("question");
        assert_eq!(reread.title, "Why borrow at all?");
    }

    #[tokio::test]
    async fn only_author_may_update_or_delete() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = service(&repo);

        let update = service
            .update_question(&author("mallory"), 1, UpdateQuestionCommand::default())
            .await;
        assert!(matches!(update, Err(QuestionServiceError::Forbidden)));

        let delete = service.delete_question(&author("mallory"), 1).await;
        assert!(matches!(delete, Err(QuestionServiceError::Forbidden)));
        assert!(service.get_question(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_cached_question() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = service(&repo);
        service.get_question(1).await.unwrap();

        service.delete_question(&author("alice"), 1).await.unwrap();

        assert!(service.get_question(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unanswered_listing_skips_answered_questions() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = service(&repo);
        let second = service
            .post_question(
                &author("alice"),
                PostQuestionCommand {
                    title: "Second".into(),
                    content: "Another one".into(),
                },
            )
            .await
            .unwrap();
        service
            .post_answer(
                &author("bob"),
                PostAnswerCommand {
                    question_id: 1,
                    content: "Answered".into(),
                },
            )
            .await
            .unwrap();

        let page = service
            .list_unanswered(PageRequest::default())
            .await
            .unwrap();

        let ids: Vec<i32> = page.items.iter().map(|q| q.question_id).collect();
        assert_eq!(ids, vec![second.question_id]);
    }

    #[tokio::test]
    async fn service_without_cache_always_reads_store() {
        let repo = Arc::new(MemoryRepo::with_question(1, "alice"));
        let service = QuestionService::new(repo.clone(), repo.clone(), None);

        service.get_question(1).await.unwrap();
        service.get_question(1).await.unwrap();

        assert_eq!(repo.fetches(), 2);
    }
}
