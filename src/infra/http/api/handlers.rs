use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::application::pagination::{Page, PageRequest};
use crate::application::questions::{
    Author, PostAnswerCommand, PostQuestionCommand, UpdateQuestionCommand,
};
use crate::application::repos::QuestionQueryFilter;
use crate::domain::entities::{AnswerRecord, QuestionAggregate};

use super::error::ApiError;
use super::models::*;
use super::state::ApiState;

// -------- Questions --------
pub async fn list_questions(
    State(state): State<ApiState>,
    Query(query): Query<QuestionListQuery>,
) -> Result<Json<Page<QuestionAggregate>>, ApiError> {
    let page = PageRequest::from_query(query.page, query.page_size, &state.page_limits);
    let filter = QuestionQueryFilter {
        search: query
            .search
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        unanswered: false,
        include_answers: query.include_answers,
    };

    let page = state.questions.list_questions(&filter, page).await?;
    Ok(Json(page))
}

pub async fn list_unanswered(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<QuestionAggregate>>, ApiError> {
    let page = PageRequest::from_query(query.page, query.page_size, &state.page_limits);
    let page = state.questions.list_unanswered(page).await?;
    Ok(Json(page))
}

pub async fn get_question(
    State(state): State<ApiState>,
    Path(question_id): Path<i32>,
) -> Result<Json<QuestionAggregate>, ApiError> {
    let question = state
        .questions
        .get_question(question_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Question not found"))?;
    Ok(Json(Arc::unwrap_or_clone(question)))
}

pub async fn create_question(
    State(state): State<ApiState>,
    author: Author,
    Json(payload): Json<QuestionCreateRequest>,
) -> Result<Response, ApiError> {
    let command = PostQuestionCommand {
        title: payload.title,
        content: payload.content,
    };
    let question = state.questions.post_question(&author, command).await?;

    let location = format!("/api/questions/{}", question.question_id);
    let mut response = (StatusCode::CREATED, Json(Arc::unwrap_or_clone(question))).into_response();
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

pub async fn update_question(
    State(state): State<ApiState>,
    author: Author,
    Path(question_id): Path<i32>,
    Json(payload): Json<QuestionUpdateRequest>,
) -> Result<Json<QuestionAggregate>, ApiError> {
    let command = UpdateQuestionCommand {
        title: payload.title,
        content: payload.content,
    };
    let question = state
        .questions
        .update_question(&author, question_id, command)
        .await?;
    Ok(Json(Arc::unwrap_or_clone(question)))
}

pub async fn delete_question(
    State(state): State<ApiState>,
    author: Author,
    Path(question_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state
        .questions
        .delete_question(&author, question_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// -------- Answers --------
pub async fn post_answer(
    State(state): State<ApiState>,
    author: Author,
    Json(payload): Json<AnswerCreateRequest>,
) -> Result<Json<AnswerRecord>, ApiError> {
    let command = PostAnswerCommand {
        question_id: payload.question_id,
        content: payload.content,
    };
    let answer = state.questions.post_answer(&author, command).await?;
    Ok(Json(answer))
}

pub async fn get_answer(
    State(state): State<ApiState>,
    Path(answer_id): Path<i32>,
) -> Result<Json<AnswerRecord>, ApiError> {
    let answer = state
        .questions
        .get_answer(answer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Answer not found"))?;
    Ok(Json(answer))
}
