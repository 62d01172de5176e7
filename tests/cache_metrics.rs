use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use time::macros::datetime;

use qanda::application::pagination::PageRequest;
use qanda::application::questions::QuestionService;
use qanda::application::repos::{
    CreateAnswerParams, CreateQuestionParams, QuestionQueryFilter, QuestionsRepo,
    QuestionsWriteRepo, RepoError, UpdateQuestionParams,
};
use qanda::cache::QuestionCache;
use qanda::domain::aggregate::{JoinedRow, QuestionRow};
use qanda::domain::entities::{AnswerRecord, QuestionAggregate};

fn question_row(question_id: i32) -> QuestionRow {
    QuestionRow {
        question_id,
        title: format!("Question {question_id}"),
        content: "Metrics test question".to_string(),
        user_id: "u1".to_string(),
        user_name: "ann@example.com".to_string(),
        created: datetime!(2024-03-01 12:00 UTC),
    }
}

fn aggregate(question_id: i32) -> QuestionAggregate {
    QuestionAggregate::from(question_row(question_id))
}

/// Serves question 1 with one well-formed answer and one answer that belongs
/// to another question.
struct MalformedRowsRepo;

#[async_trait]
impl QuestionsRepo for MalformedRowsRepo {
    async fn fetch_single(&self, question_id: i32) -> Result<Vec<JoinedRow>, RepoError> {
        let answer = |answer_id, owner| AnswerRecord {
            answer_id,
            question_id: owner,
            content: "answer".to_string(),
            user_id: "u2".to_string(),
            user_name: "ben@example.com".to_string(),
            created: datetime!(2024-03-02 12:00 UTC),
        };
        Ok(vec![
            JoinedRow::new(question_row(question_id), Some(answer(10, question_id))),
            JoinedRow::new(question_row(question_id), Some(answer(11, question_id + 1))),
        ])
    }

    async fn fetch_many(
        &self,
        _filter: &QuestionQueryFilter,
        _page: PageRequest,
    ) -> Result<Vec<JoinedRow>, RepoError> {
        Ok(Vec::new())
    }

    async fn question_exists(&self, _question_id: i32) -> Result<bool, RepoError> {
        Ok(true)
    }

    async fn find_answer(&self, _answer_id: i32) -> Result<Option<AnswerRecord>, RepoError> {
        Ok(None)
    }
}

#[async_trait]
impl QuestionsWriteRepo for MalformedRowsRepo {
    async fn create_question(&self, _params: CreateQuestionParams) -> Result<i32, RepoError> {
        Err(RepoError::from_persistence("read-only"))
    }

    async fn update_question(&self, _params: UpdateQuestionParams) -> Result<(), RepoError> {
        Err(RepoError::from_persistence("read-only"))
    }

    async fn delete_question(&self, _question_id: i32) -> Result<(), RepoError> {
        Err(RepoError::from_persistence("read-only"))
    }

    async fn create_answer(&self, _params: CreateAnswerParams) -> Result<AnswerRecord, RepoError> {
        Err(RepoError::from_persistence("read-only"))
    }
}

#[tokio::test]
async fn cache_and_reducer_paths_emit_expected_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // One miss, one hit, one capacity eviction.
    let cache = QuestionCache::with_capacity(NonZeroUsize::MIN);
    assert!(cache.get(1).is_none());
    cache.set(aggregate(1));
    assert!(cache.get(1).is_some());
    cache.set(aggregate(1));
    cache.set(aggregate(2));

    // Service read-through over a store that returns one malformed answer row.
    let repo = Arc::new(MalformedRowsRepo);
    let reader: Arc<dyn QuestionsRepo> = repo.clone();
    let writer: Arc<dyn QuestionsWriteRepo> = repo;
    let service = QuestionService::new(
        reader,
        writer,
        Some(Arc::new(QuestionCache::with_capacity(NonZeroUsize::MIN))),
    );
    let loaded = service
        .get_question(1)
        .await
        .expect("store read should succeed")
        .expect("question should exist");
    assert_eq!(loaded.answers.len(), 1);
    assert_eq!(loaded.answers[0].answer_id, 10);

    let metrics: HashMap<String, DebugValue> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| (composite_key.key().name().to_string(), value))
        .collect();

    for metric in [
        "qanda_cache_hit_total",
        "qanda_cache_miss_total",
        "qanda_cache_evict_total",
        "qanda_reduce_malformed_row_total",
        "qanda_store_fetch_ms",
    ] {
        assert!(metrics.contains_key(metric), "missing metric: {metric}");
    }

    assert!(matches!(
        metrics.get("qanda_cache_evict_total"),
        Some(DebugValue::Counter(1))
    ));
    assert!(matches!(
        metrics.get("qanda_reduce_malformed_row_total"),
        Some(DebugValue::Counter(1))
    ));
}
