//! Double-submit cookie CSRF protection
//!
//! Every visitor gets a random token in the `csrf_token` cookie. Requests
//! with an unsafe method must send the same value back in the `csrf_token`
//! form field or the `X-CSRF-Token` header. The webhook is exempt; it is
//! authenticated by its signature instead.

use axum::body::{self, Body};
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::RngCore;

use super::SharedState;

pub const COOKIE_NAME: &str = "csrf_token";
pub const FORM_FIELD: &str = "csrf_token";
pub const HEADER_NAME: &str = "x-csrf-token";

const EXEMPT_PATHS: [&str; 1] = ["/webhook"];
const MAX_FORM_BYTES: usize = 64 * 1024;

/// The visitor's token, available to handlers as a request extension
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn needs_check(method: &Method, path: &str) -> bool {
    let safe = matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    );
    !safe && !EXEMPT_PATHS.contains(&path)
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Pull the presented token out of the header or the form body.
///
/// The body is buffered and put back so the handler can still read it.
async fn presented_token(request: Request) -> Result<(Request, Option<String>), Response> {
    if let Some(value) = request
        .headers()
        .get(HEADER_NAME)
        .and_then(|v| v.to_str().ok())
    {
        let token = value.to_string();
        return Ok((request, Some(token)));
    }

    if !is_form(&request) {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response())?;

    let token = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
        .ok()
        .and_then(|fields| {
            fields
                .into_iter()
                .find(|(name, _)| name == FORM_FIELD)
                .map(|(_, value)| value)
        });

    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

fn token_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Middleware enforcing the token on unsafe requests
pub async fn protect(
    State(state): State<SharedState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let existing = jar
        .get(COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let issued = existing.is_none();
    let token = existing.unwrap_or_else(generate_token);
    let jar = if issued {
        jar.add(token_cookie(token.clone(), state.config.in_production))
    } else {
        jar
    };

    let mut request = request;
    if needs_check(request.method(), request.uri().path()) {
        let (checked, presented) = match presented_token(request).await {
            Ok(found) => found,
            Err(response) => return response,
        };
        let valid = !issued
            && presented
                .map(|p| constant_time_eq::constant_time_eq(p.as_bytes(), token.as_bytes()))
                .unwrap_or(false);
        if !valid {
            tracing::warn!(
                "Rejected {} {}: missing or invalid CSRF token",
                checked.method(),
                checked.uri().path()
            );
            return (jar, (StatusCode::FORBIDDEN, "invalid CSRF token")).into_response();
        }
        request = checked;
    }

    request.extensions_mut().insert(CsrfToken(token));
    let response = next.run(request).await;
    if issued {
        (jar, response).into_response()
    } else {
        response
    }
}
