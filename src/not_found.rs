use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub(crate) const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";

pub async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": NOT_FOUND_MESSAGE })),
    )
        .into_response()
}
