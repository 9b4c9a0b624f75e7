use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::compare::ComparisonDimensions;
use crate::error::ComparisonError;
use crate::pipeline::Comparison;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// `POST /compare` body. Every field is optional so that missing URLs are
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct CompareRequest {
    #[serde(default)]
    pub url1: Option<String>,
    #[serde(default)]
    pub url2: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub success: bool,
    pub data: CompareData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareData {
    pub mismatch_percentage: f64,
    pub mismatched_pixels: u64,
    pub total_pixels: u64,
    pub dimensions: ComparisonDimensions,
    pub images: Images,
}

/// PNGs as `data:image/png;base64,...` URIs.
#[derive(Debug, Serialize)]
pub struct Images {
    pub screenshot1: String,
    pub screenshot2: String,
    pub diff: String,
}

impl From<Comparison> for CompareResponse {
    fn from(comparison: Comparison) -> Self {
        let result = comparison.result;
        Self {
            success: true,
            data: CompareData {
                mismatch_percentage: result.mismatch_percentage,
                mismatched_pixels: result.mismatched_pixels,
                total_pixels: result.total_pixels,
                dimensions: result.dimensions,
                images: Images {
                    screenshot1: png_data_uri(&comparison.screenshot1),
                    screenshot2: png_data_uri(&comparison.screenshot2),
                    diff: png_data_uri(&comparison.diff_png),
                },
            },
        }
    }
}

pub fn png_data_uri(png: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    format!("{PNG_DATA_URI_PREFIX}{encoded}")
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// A failed request: status code plus the message sent to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ComparisonError> for ApiError {
    fn from(err: ComparisonError) -> Self {
        let status = if err.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, error = %self.message, "request failed");
        }
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
