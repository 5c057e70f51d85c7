use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use http::header::RETRY_AFTER;
use serde::Serialize;

pub mod api;
pub mod stream;
pub mod svc;

// error taxonomy for the http surface
//
// external tool failures never show up here: a failing image backend
// degrades to serving the original bytes, and a failing frame extraction
// degrades to an empty 204, both inside the thumbnail handler.
//
// containment violations are deliberately mapped to NotFound so that a
// traversal attempt cannot learn whether its target exists
#[derive(Debug)]
pub enum HttpError {
    NotFound,
    PathInvalid,
    Unsupported,
    Overloaded,
    Internal(anyhow::Error),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message) = match self {
            HttpError::NotFound => (StatusCode::NOT_FOUND, String::from("not found")),
            HttpError::PathInvalid => {
                (StatusCode::BAD_REQUEST, String::from("invalid path token"))
            }
            HttpError::Unsupported => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                String::from("unsupported media kind"),
            ),
            HttpError::Overloaded => {
                // retryable: the rendition gate is saturated, not broken
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(RETRY_AFTER, "1")],
                    Json(ErrorResponse {
                        message: String::from("too many renditions in flight, retry shortly"),
                    }),
                )
                    .into_response();
            }
            HttpError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("internal server error: {err}"),
            ),
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

// this lets handlers use ? on anything anyhow-compatible and send the
// failure all the way back to the caller, which simplifies everything
// drastically
impl<E> From<E> for HttpError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        HttpError::Internal(err.into())
    }
}
