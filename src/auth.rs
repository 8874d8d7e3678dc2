//! Bearer-token guard for the HTTP transport.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{errors::AppError, AppState};

pub async fn require_bearer_token(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(auth) = auth_header.ok_or(AppError::unauthorized(
        "missing_token",
        "missing authorization header",
    ))?;

    if !tokens_match(auth.token(), &state.api_token) {
        return Err(AppError::unauthorized(
            "invalid_token",
            "invalid bearer token",
        ));
    }

    Ok(next.run(request).await)
}

/// Compares without short-circuiting on the first differing byte.
pub fn tokens_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    if presented.len() != expected.len() {
        return false;
    }

    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (left, right)| diff | (left ^ right))
        == 0
}

#[cfg(test)]
mod tests {
    use super::tokens_match;

    #[test]
    fn matching_tokens_are_accepted() {
        assert!(tokens_match("token-1234567890ab", "token-1234567890ab"));
    }

    #[test]
    fn differing_tokens_are_rejected() {
        assert!(!tokens_match("token-1234567890ac", "token-1234567890ab"));
        assert!(!tokens_match("token", "token-1234567890ab"));
        assert!(!tokens_match("", "token-1234567890ab"));
    }
}
