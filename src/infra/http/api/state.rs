use std::sync::Arc;

use crate::application::pagination::PageLimits;
use crate::application::questions::QuestionService;

#[derive(Clone)]
pub struct ApiState {
    pub questions: Arc<QuestionService>,
    pub page_limits: PageLimits,
}
