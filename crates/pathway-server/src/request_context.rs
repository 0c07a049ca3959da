use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::{HeaderMap, HeaderValue};
use pathway_core::RequestContext;
use secrecy::SecretString;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CLIENT_ID_HEADER: &str = "x-client-id";
/// Caller-supplied provider key forwarded to the upstream provider
pub const PROVIDER_KEY_HEADER: &str = "x-provider-api-key";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Middleware that builds a `RequestContext` from request headers
///
/// The request identifier is echoed back on the response.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let context = context_from_headers(request.headers());
    let request_id = HeaderValue::from_str(&context.request_id).ok();
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Some(value) = request_id {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let mut context = RequestContext::new();

    if let Some(id) = header(headers, REQUEST_ID_HEADER).filter(|id| id.len() <= MAX_REQUEST_ID_LEN) {
        context = context.with_request_id(id);
    }
    if let Some(client) = header(headers, CLIENT_ID_HEADER) {
        context = context.with_client_id(client);
    }
    context.api_key = header(headers, PROVIDER_KEY_HEADER).map(|key| SecretString::from(key.to_owned()));

    context
}
