use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ErrorResponse;

/// Deserialize and validate a JSON body before the handler runs, then
/// replay the bytes so the handler's own extractor still works. Rejections
/// use the same error envelope as every other failure.
pub async fn validate_json<T: DeserializeOwned + Validate>(
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let (parts, body) = req.into_parts();

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| reject("request body is unreadable"))?;

    let value: T = serde_json::from_slice(&bytes)
        .map_err(|e| reject(&format!("invalid JSON body: {}", e)))?;

    value.validate().map_err(|e| {
        let fields = e
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors
                    .iter()
                    .filter_map(|err| err.message.as_ref().map(|m| m.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        reject(&fields)
    })?;

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

fn reject(message: &str) -> Response {
    let body = Json(ErrorResponse {
        error: message.to_string(),
        error_code: "INVALID_REQUEST".to_string(),
        details: None,
    });
    (StatusCode::BAD_REQUEST, body).into_response()
}
