//! Caller identity for protected endpoints.
//!
//! Authentication lives in front of this service (a gateway or reverse
//! proxy). It forwards the authenticated account id in the `x-user-id`
//! header, and this middleware turns that header into an `Extension<i64>`.
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//!
//! async fn protected_handler(Extension(user_id): Extension<i64>) -> String {
//!     format!("Acting as user {}", user_id)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Header carrying the caller's account id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Reject requests without a usable `x-user-id` header.
///
/// - **Success**: injects `user_id: i64` into request extensions
/// - **Missing or malformed header**: `401 Unauthorized`
pub async fn identity_middleware(mut request: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = user_id_from_headers(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    request.extensions_mut().insert(user_id);
    Ok(next.run(request).await)
}

/// Parse the caller id; only positive ids are accepted
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|&id| id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_parses_user_id() {
        assert_eq!(user_id_from_headers(&headers("42")), Some(42));
        assert_eq!(user_id_from_headers(&headers(" 7 ")), Some(7));
    }

    #[test]
    fn test_rejects_bad_user_ids() {
        assert_eq!(user_id_from_headers(&HeaderMap::new()), None);
        assert_eq!(user_id_from_headers(&headers("abc")), None);
        assert_eq!(user_id_from_headers(&headers("0")), None);
        assert_eq!(user_id_from_headers(&headers("-3")), None);
    }
}
