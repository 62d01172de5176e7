use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct QuestionListQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub include_answers: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionCreateRequest {
    pub title: String,
    pub content: String,
}

/// Omitted or blank fields keep their stored value.
#[derive(Debug, Deserialize)]
pub struct QuestionUpdateRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerCreateRequest {
    pub question_id: i32,
    pub content: String,
}
