//! Body and cookie parsing stage.
//!
//! Parses JSON and URL-encoded bodies up front so that later stages (method
//! override reads `_method` from forms) see the parsed value, and so that a
//! malformed body fails the request before any route runs. The raw bytes are
//! put back into the request afterwards, so `Form`/`Json` extractors in
//! handlers keep working.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use http_body_util::LengthLimitError;
use serde_json::Value;
use tower_sessions::cookie::Cookie;

use crate::error::AppError;
use crate::state::AppState;

/// A request body parsed according to its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedBody {
    /// No parseable content type was declared.
    None,
    /// `application/json` (or `+json`). An empty body parses as `{}`.
    Json(Value),
    /// `application/x-www-form-urlencoded`, in field order.
    Form(Vec<(String, String)>),
}

impl ParsedBody {
    /// Look up a top-level string field (form field or JSON object key).
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Json(value) => value.get(name).and_then(Value::as_str),
            Self::Form(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
        }
    }

    /// Like [`ParsedBody::field`], failing with `MalformedInput` when the
    /// field is absent.
    ///
    /// # Errors
    ///
    /// Returns `AppError::MalformedInput` naming the missing field.
    pub fn require(&self, name: &str) -> Result<&str, AppError> {
        self.field(name)
            .ok_or_else(|| AppError::MalformedInput(format!("missing field `{name}`")))
    }
}

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .cloned()
            .unwrap_or(Self::None))
    }
}

/// Cookies sent with the request, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCookies(HashMap<String, String>);

impl RequestCookies {
    /// Parse every `Cookie` header. Unparseable pairs are skipped.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let cookies = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
            .collect();

        Self(cookies)
    }

    /// Get a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromRequestParts<S> for RequestCookies
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

/// Content types this stage knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

impl BodyKind {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();

        if essence == "application/json"
            || (essence.starts_with("application/") && essence.ends_with("+json"))
        {
            Some(Self::Json)
        } else if essence == "application/x-www-form-urlencoded" {
            Some(Self::Form)
        } else {
            None
        }
    }

    fn parse(self, bytes: &Bytes) -> Result<ParsedBody, AppError> {
        match self {
            Self::Json => parse_json(bytes),
            Self::Form => parse_form(bytes),
        }
    }
}

/// Strict JSON: only objects and arrays are accepted at the top level.
fn parse_json(bytes: &[u8]) -> Result<ParsedBody, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParsedBody::Json(Value::Object(serde_json::Map::new())));
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| AppError::MalformedInput(format!("invalid JSON body: {e}")))?;

    if !(value.is_object() || value.is_array()) {
        return Err(AppError::MalformedInput(
            "JSON body must be an object or an array".to_owned(),
        ));
    }

    Ok(ParsedBody::Json(value))
}

fn parse_form(bytes: &[u8]) -> Result<ParsedBody, AppError> {
    std::str::from_utf8(bytes)
        .map_err(|e| AppError::MalformedInput(format!("form body is not valid UTF-8: {e}")))?;

    let pairs = url::form_urlencoded::parse(bytes).into_owned().collect();
    Ok(ParsedBody::Form(pairs))
}

fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Pipeline stage: parse cookies and the request body.
///
/// # Errors
///
/// Returns `AppError::MalformedInput` if the body does not parse per its
/// content type, and `AppError::PayloadTooLarge` if it exceeds the
/// configured limit.
pub async fn parse_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let limit = state.config().body_limit_bytes;
    let (mut parts, body) = request.into_parts();

    parts
        .extensions
        .insert(RequestCookies::from_headers(&parts.headers));

    let Some(kind) = BodyKind::from_headers(&parts.headers) else {
        parts.extensions.insert(ParsedBody::None);
        return Ok(next.run(Request::from_parts(parts, body)).await);
    };

    if content_length(&parts.headers).is_some_and(|len| len > limit) {
        return Err(AppError::PayloadTooLarge { limit });
    }

    let bytes = axum::body::to_bytes(body, limit).await.map_err(|err| {
        if err.into_inner().is::<LengthLimitError>() {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::MalformedInput("failed to read request body".to_owned())
        }
    })?;

    let parsed = kind.parse(&bytes)?;
    parts.extensions.insert(parsed);

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(content_type).unwrap(),
        );
        headers
    }

    #[test]
    fn test_body_kind_detection() {
        assert_eq!(
            BodyKind::from_headers(&headers("application/json; charset=utf-8")),
            Some(BodyKind::Json)
        );
        assert_eq!(
            BodyKind::from_headers(&headers("application/vnd.api+json")),
            Some(BodyKind::Json)
        );
        assert_eq!(
            BodyKind::from_headers(&headers("application/x-www-form-urlencoded")),
            Some(BodyKind::Form)
        );
        assert_eq!(BodyKind::from_headers(&headers("text/plain")), None);
        assert_eq!(BodyKind::from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_parse_json_object() {
        let parsed = parse_json(br#"{"_method":"DELETE"}"#).unwrap();
        assert_eq!(parsed, ParsedBody::Json(json!({"_method": "DELETE"})));
        assert_eq!(parsed.field("_method"), Some("DELETE"));
    }

    #[test]
    fn test_parse_json_empty_is_empty_object() {
        assert_eq!(parse_json(b"  ").unwrap(), ParsedBody::Json(json!({})));
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        assert!(matches!(
            parse_json(b"{not json"),
            Err(AppError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_parse_json_rejects_scalars() {
        assert!(matches!(parse_json(b"42"), Err(AppError::MalformedInput(_))));
    }

    #[test]
    fn test_parse_form_fields() {
        let parsed = parse_form(b"username=ada&password=p%40ss+word").unwrap();
        assert_eq!(parsed.field("username"), Some("ada"));
        assert_eq!(parsed.field("password"), Some("p@ss word"));
        assert_eq!(parsed.field("missing"), None);
    }

    #[test]
    fn test_require_names_missing_field() {
        let parsed = parse_form(b"username=ada").unwrap();
        assert_eq!(parsed.require("username").unwrap(), "ada");
        assert!(matches!(
            parsed.require("password"),
            Err(AppError::MalformedInput(msg)) if msg == "missing field `password`"
        ));
        assert!(ParsedBody::None.require("username").is_err());
    }

    #[test]
    fn test_parse_form_rejects_invalid_utf8() {
        assert!(matches!(
            parse_form(&[0x61, 0x3d, 0xff, 0xfe]),
            Err(AppError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_cookies_from_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; b=two"));
        headers.append(header::COOKIE, HeaderValue::from_static("c=3"));

        let cookies = RequestCookies::from_headers(&headers);
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies.get("b"), Some("two"));
        assert_eq!(cookies.get("c"), Some("3"));
        assert_eq!(cookies.get("d"), None);
    }
}
