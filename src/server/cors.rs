//! CORS for the single configured front-end origin

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, VARY,
        },
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

/// The origin allowed to call the API with credentials
#[derive(Debug, Clone)]
pub struct AllowedOrigin(HeaderValue);

impl AllowedOrigin {
    /// Validate an origin such as `http://localhost:5173`
    pub fn new(origin: &str) -> Result<Self> {
        let value = HeaderValue::from_str(origin.trim_end_matches('/'))
            .with_context(|| format!("Invalid front-end origin '{}'", origin))?;
        Ok(Self(value))
    }
}

/// Middleware: answer preflights with 204 and stamp CORS headers on every response
pub async fn cors(State(origin): State<AllowedOrigin>, request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.0);
    headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(VARY, HeaderValue::from_static("Origin"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origin() {
        let origin = AllowedOrigin::new("http://localhost:5173/").unwrap();
        assert_eq!(origin.0, "http://localhost:5173");
        assert!(AllowedOrigin::new("http://bad\norigin").is_err());
    }
}
