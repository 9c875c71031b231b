//! Request middleware: principal resolution, security headers, request log.

use crate::error::AppResult;
use crate::session::session_token;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use libcat_core::SecurityHeaderPolicy;
use log::info;
use std::time::Instant;

/// Security headers validated once at startup.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn from_policy(policy: &SecurityHeaderPolicy) -> Result<Self, String> {
        let headers = policy
            .headers()
            .into_iter()
            .map(|(name, value)| {
                let header_name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|err| format!("invalid header name `{name}`: {err}"))?;
                let header_value = HeaderValue::from_str(value)
                    .map_err(|err| format!("invalid value for header `{name}`: {err}"))?;
                Ok((header_name, header_value))
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { headers })
    }

    /// Overwrites any same-named header a handler set.
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in &self.headers {
            target.insert(name.clone(), value.clone());
        }
    }
}

/// Loads the session principal into request extensions. Missing or stale
/// sessions resolve to `Principal::Anonymous`.
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let token = session_token(request.headers());
    let principal = state.accounts(|accounts| accounts.principal_for_session(token.as_deref()))?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

pub async fn security_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    state.security_headers().apply(response.headers_mut());
    response
}

/// Logs method, path, status and duration. Query strings are not logged.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let outcome = if status.is_server_error() { "error" } else { "ok" };
    info!(
        "event=http_request module=server status={outcome} method={method} path={path} http_status={} duration_ms={}",
        status.as_u16(),
        started.elapsed().as_millis()
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use libcat_core::SecuritySettings;

    #[test]
    fn headers_follow_the_policy() {
        let policy = SecurityHeaderPolicy::from_settings(&SecuritySettings {
            secure_browser_xss_filter: true,
            csp_img_src: vec!["'self'".to_string(), "data:".to_string()],
            ..SecuritySettings::default()
        });
        let headers = SecurityHeaders::from_policy(&policy).unwrap();

        let mut target = HeaderMap::new();
        headers.apply(&mut target);
        assert_eq!(target["x-xss-protection"], "1; mode=block");
        assert_eq!(target["content-security-policy"], "img-src 'self' data:");
    }

    #[test]
    fn control_characters_are_rejected_at_startup() {
        let policy = SecurityHeaderPolicy::from_settings(&SecuritySettings {
            csp_default_src: vec!["'self'\n".to_string()],
            ..SecuritySettings::default()
        });
        let err = SecurityHeaders::from_policy(&policy).unwrap_err();
        assert!(err.contains("Content-Security-Policy"));
    }
}
