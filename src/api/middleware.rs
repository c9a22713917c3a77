//! API Middleware
//!
//! Request context extraction and request logging.

use std::net::IpAddr;

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::OperationContext;
use crate::error::{AppError, AppResult};

pub const REQUEST_USER_HEADER: &str = "X-Request-User-Id";
pub const MACHINE_HEADER: &str = "X-Machine-Id";
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// Parse an optional UUID header; present but malformed is an error
fn uuid_header(headers: &HeaderMap, name: &str) -> AppResult<Option<Uuid>> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Some)
            .ok_or_else(|| AppError::InvalidRequest(format!("Invalid {} header format", name))),
    }
}

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
}

/// Build the operation context from request headers
pub fn context_from_headers(headers: &HeaderMap) -> AppResult<OperationContext> {
    let mut context = OperationContext::new();

    if let Some(user_id) = uuid_header(headers, REQUEST_USER_HEADER)? {
        context = context.with_request_user(user_id);
    }
    if let Some(machine_id) = uuid_header(headers, MACHINE_HEADER)? {
        context = context.with_machine(machine_id);
    }

    // Extract correlation ID or generate new one
    let correlation_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    context = context.with_correlation_id(correlation_id);

    if let Some(ip) = client_ip(headers) {
        context = context.with_client_ip(ip);
    }

    Ok(context)
}

/// Store the [`OperationContext`] in request extensions
pub async fn request_context_middleware(
    mut request: Request<Body>,
    next: Next,
) -> AppResult<Response> {
    let context = context_from_headers(request.headers())?;
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie", "x-api-key"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("authorization", "Bearer secret".parse().unwrap());
        headers.insert("x-request-user-id", "user-123".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let auth = masked.iter().find(|(k, _)| k == "authorization");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let user_id = masked.iter().find(|(k, _)| k == "x-request-user-id");

        assert_eq!(auth.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(user_id.unwrap().1, "user-123");
    }

    #[test]
    fn test_context_from_headers() {
        let user_id = Uuid::new_v4();
        let machine_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_USER_HEADER, user_id.to_string().parse().unwrap());
        headers.insert(MACHINE_HEADER, machine_id.to_string().parse().unwrap());
        headers.insert("X-Forwarded-For", "10.0.0.7, 192.168.1.1".parse().unwrap());

        let context = context_from_headers(&headers).unwrap();

        assert_eq!(context.request_user_id, Some(user_id));
        assert_eq!(context.machine_id, Some(machine_id));
        assert!(context.correlation_id.is_some());
        assert_eq!(context.client_ip, Some("10.0.0.7".parse().unwrap()));
    }

    #[test]
    fn test_missing_identity_headers_are_allowed() {
        let context = context_from_headers(&HeaderMap::new()).unwrap();

        assert!(context.request_user_id.is_none());
        assert!(context.machine_id.is_none());
    }

    #[test]
    fn test_malformed_uuid_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(MACHINE_HEADER, "not-a-uuid".parse().unwrap());

        let err = context_from_headers(&headers).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
