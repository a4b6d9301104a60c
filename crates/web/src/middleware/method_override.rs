//! Method override stage.
//!
//! HTML forms can only send GET and POST. A POST request may ask to be
//! treated as another method through the `X-HTTP-Method-Override` header, a
//! `_method` query parameter, or a `_method` field in the parsed body. The
//! first source present wins. Runs before routing, so the route table sees
//! the overridden method.

use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::Response,
};

use super::body::ParsedBody;

/// Header carrying the requested method.
pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

/// Query parameter and body field carrying the requested method.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// The method the client actually sent, kept when an override was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalMethod(pub Method);

/// Pipeline stage: rewrite the method of overridden POST requests.
pub async fn override_method(mut request: Request, next: Next) -> Response {
    if request.method() == Method::POST
        && let Some(method) = requested_method(&request)
    {
        tracing::debug!(
            from = %request.method(),
            to = %method,
            "Applying method override"
        );
        request
            .extensions_mut()
            .insert(OriginalMethod(Method::POST));
        *request.method_mut() = method;
    }

    next.run(request).await
}

fn requested_method(request: &Request) -> Option<Method> {
    let from_header = request
        .headers()
        .get(METHOD_OVERRIDE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let candidate = from_header
        .or_else(|| query_field(request.uri().query()?))
        .or_else(|| {
            request
                .extensions()
                .get::<ParsedBody>()?
                .field(METHOD_OVERRIDE_FIELD)
                .map(str::to_owned)
        })?;

    parse_override(&candidate)
}

fn query_field(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == METHOD_OVERRIDE_FIELD)
        .map(|(_, value)| value.into_owned())
}

/// Accept only methods that make sense as an override target.
fn parse_override(value: &str) -> Option<Method> {
    match value.trim().to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "HEAD" => Some(Method::HEAD),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        "OPTIONS" => Some(Method::OPTIONS),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn post(uri: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_parse_override_is_case_insensitive() {
        assert_eq!(parse_override("delete"), Some(Method::DELETE));
        assert_eq!(parse_override(" Put "), Some(Method::PUT));
    }

    #[test]
    fn test_parse_override_rejects_unknown_methods() {
        assert_eq!(parse_override("POST"), None);
        assert_eq!(parse_override("CONNECT"), None);
        assert_eq!(parse_override("TRACE"), None);
        assert_eq!(parse_override(""), None);
    }

    #[test]
    fn test_header_wins_over_query() {
        let mut request = post("/logout?_method=PUT");
        request
            .headers_mut()
            .insert(METHOD_OVERRIDE_HEADER, "DELETE".parse().unwrap());
        assert_eq!(requested_method(&request), Some(Method::DELETE));
    }

    #[test]
    fn test_query_field() {
        let request = post("/logout?x=1&_method=delete");
        assert_eq!(requested_method(&request), Some(Method::DELETE));
    }

    #[test]
    fn test_body_field() {
        let mut request = post("/logout");
        request.extensions_mut().insert(ParsedBody::Form(vec![(
            "_method".to_owned(),
            "PATCH".to_owned(),
        )]));
        assert_eq!(requested_method(&request), Some(Method::PATCH));
    }

    #[test]
    fn test_no_override_requested() {
        let mut request = post("/login");
        request.extensions_mut().insert(ParsedBody::None);
        assert_eq!(requested_method(&request), None);
    }
}
