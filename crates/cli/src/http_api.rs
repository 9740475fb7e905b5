use crate::command::{CommandResponse, CommandStatus, ResponseMeta};
use crate::server_security::{AuthToken, AUTH_TOKEN_ENV};
use axum::{
    body::Body,
    http::{header, HeaderMap, Response as HttpResponse, StatusCode},
    response::Response,
};
use navigator_protocol::{serialize_json, ErrorEnvelope};
use serde::Serialize;

pub(crate) fn is_authorized(headers: &HeaderMap, token: &AuthToken) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| token.accepts(value))
}

/// Error envelope for failures that happen before an action runs.
pub(crate) fn rejection(code: &str, message: String) -> CommandResponse {
    let hint = match code {
        "unauthorized" => format!(
            "The server was started with {AUTH_TOKEN_ENV}; send Authorization: Bearer <token>."
        ),
        "invalid_request" => {
            "Send a JSON body of the form {\"action\": ..., \"payload\": {...}}.".to_string()
        }
        _ => "Check the request against the capabilities action.".to_string(),
    };

    CommandResponse {
        status: CommandStatus::Error,
        message: Some(message.clone()),
        error: Some(ErrorEnvelope {
            code: code.to_string(),
            message,
            details: None,
            hint: Some(hint),
            next_actions: Vec::new(),
        }),
        hints: Vec::new(),
        next_actions: Vec::new(),
        data: serde_json::Value::Null,
        meta: ResponseMeta::default(),
    }
}

/// HTTP status for a finished command: client-side codes map to 4xx.
pub(crate) fn status_for(response: &CommandResponse) -> StatusCode {
    let Some(error) = &response.error else {
        return StatusCode::OK;
    };
    match error.code.as_str() {
        "invalid_request" | "invalid_reference" => StatusCode::BAD_REQUEST,
        "not_found" => StatusCode::NOT_FOUND,
        "unauthorized" => StatusCode::BAD_GATEWAY,
        "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
        "network" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<Response, StatusCode> {
    let bytes = serialize_json(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .into_bytes();

    let mut builder = HttpResponse::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if status == StatusCode::UNAUTHORIZED {
        builder = builder.header(header::WWW_AUTHENTICATE, "Bearer");
    }
    builder
        .body(Body::from(bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
