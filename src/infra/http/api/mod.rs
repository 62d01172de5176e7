pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/questions",
            get(handlers::list_questions).post(handlers::create_question),
        )
        .route("/api/questions/unanswered", get(handlers::list_unanswered))
        .route("/api/questions/answer", post(handlers::post_answer))
        .route(
            "/api/questions/{id}",
            get(handlers::get_question)
                .put(handlers::update_question)
                .delete(handlers::delete_question),
        )
        .route("/api/answers/{id}", get(handlers::get_answer))
        .with_state(state)
}
