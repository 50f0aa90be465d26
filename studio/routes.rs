use std::io::Cursor;
use tiny_http::{Header, Method, Request, Response, StatusCode};
use tracing::debug;

use crate::handlers;
use crate::state::SharedState;

pub type HttpResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn respond_with(status: u16, content_type: &str, bytes: Vec<u8>) -> HttpResponse {
    let len = bytes.len();
    let headers = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
        .into_iter()
        .collect();
    Response::new(StatusCode(status), headers, Cursor::new(bytes), Some(len), None)
}

pub fn html_response(body: String) -> HttpResponse {
    respond_with(200, "text/html; charset=utf-8", body.into_bytes())
}

pub fn png_response(bytes: Vec<u8>) -> HttpResponse {
    respond_with(200, "image/png", bytes)
}

pub fn not_found() -> HttpResponse {
    respond_with(404, "text/plain", b"404 Not Found".to_vec())
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Handlers receive a `&mut Request` so the dispatcher keeps ownership and
/// responds at the end.
pub fn dispatch(mut request: Request, state: SharedState) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let path = url.split('?').next().unwrap_or("").to_owned();
    debug!("{} {}", method, path);

    let response = match (method, path.as_str()) {
        (Method::Get, "/") => handlers::home::handle_get(&state),
        (Method::Post, "/analyze") => handlers::analyze::handle_post(&mut request, &state),
        (Method::Get, p) if p.starts_with("/saliency/") => {
            handlers::saliency::handle_get(&p["/saliency/".len()..], &state)
        }
        _ => not_found(),
    };

    let _ = request.respond(response);
}
