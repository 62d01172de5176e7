//! Caller identity forwarded by the trusted gateway.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::application::questions::Author;

use super::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

impl<S> FromRequestParts<S> for Author
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = required_header(&parts.headers, USER_ID_HEADER)?;
        let user_name = required_header(&parts.headers, USER_NAME_HEADER)?;
        Ok(Author { user_id, user_name })
    }
}

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::unauthorized(Some(format!("missing `{name}` header"))))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, StatusCode};

    use super::*;

    #[test]
    fn blank_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));

        let err = required_header(&headers, USER_ID_HEADER).expect_err("blank header");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn header_value_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static(" ann@example.com "));

        let value = required_header(&headers, USER_NAME_HEADER).expect("header present");
        assert_eq!(value, "ann@example.com");
    }
}
