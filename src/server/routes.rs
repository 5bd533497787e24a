use crate::perks::{EngineError, PerkEngine};
use crate::server::api::{self, ApiError};

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }

    fn json(body: String) -> Self {
        Self {
            status_code: 200,
            status_text: "OK",
            content_type: "application/json",
            body,
        }
    }
}

/// Route path without its query string.
fn route_path(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

pub fn route_request(engine: &PerkEngine, method: &str, path: &str, body: &str) -> HttpResponse {
    let result = match (method, route_path(path)) {
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => return HttpResponse::json(payload),
            Err(err) => return error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("GET", "/api/catalog") => api::catalog_payload(engine, path),
        ("POST", "/api/evaluate") => api::evaluate_payload(engine, body),
        ("POST", "/api/evaluate/track") => api::evaluate_track_payload(engine, body),
        ("PUT", "/api/overrides") => api::override_put_payload(engine, body),
        ("GET", "/api/ranking") => api::ranking_payload(engine, path),
        _ => return error_response(404, "Not Found", "Route not found"),
    };

    match result {
        Ok(payload) => HttpResponse::json(payload),
        Err(err) => api_error_response(&err),
    }
}

fn api_error_response(err: &ApiError) -> HttpResponse {
    match err {
        ApiError::Parse(_) | ApiError::Validation(_) => {
            error_response(400, "Bad Request", &err.to_string())
        }
        ApiError::Engine(EngineError::Store(store_err)) => {
            tracing::warn!(
                target: "perkeval::server",
                error = %store_err,
                "request.store_failed"
            );
            error_response(500, "Internal Server Error", &err.to_string())
        }
    }
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}
