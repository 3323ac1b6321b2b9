//! REST backend client for grade-sections and attendance rows.

use crate::model::{AttendancePayload, AttendanceRecord, BatchRow, GradeDetail};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    BadResponse(String),
    #[error("backend does not support {0}")]
    Unsupported(&'static str),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unreachable(_) => "backend_unreachable",
            ApiError::Status { .. } => "api_error",
            ApiError::BadResponse(_) => "bad_response",
            ApiError::Unsupported(_) => "not_supported",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::Status { status, .. } => Some(serde_json::json!({ "status": status })),
            _ => None,
        }
    }
}

/// The backend operations the attendance editor needs.
pub trait AttendanceApi {
    fn grade(&self, grade_id: i64) -> Result<GradeDetail, ApiError>;

    /// Every attendance row for a grade-section, across dates and courses.
    fn grade_attendance(&self, grade_id: i64) -> Result<Vec<AttendanceRecord>, ApiError>;

    fn create_attendance(&self, payload: &AttendancePayload) -> Result<AttendanceRecord, ApiError>;

    fn update_attendance(&self, id: i64, payload: &AttendancePayload) -> Result<(), ApiError>;

    /// All-or-nothing upsert of many rows.
    fn upsert_batch(&self, _rows: &[BatchRow]) -> Result<(), ApiError> {
        Err(ApiError::Unsupported("batch upsert"))
    }
}

#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token.as_deref() {
            Some(t) if !t.is_empty() => builder.bearer_auth(t),
            _ => builder,
        }
    }

    fn send(&self, method: &str, path: &str, builder: RequestBuilder) -> Result<Response, ApiError> {
        log::debug!("{} {}", method, path);
        let res = self
            .authorized(builder)
            .send()
            .map_err(|e| ApiError::Unreachable(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let message = res.text().unwrap_or_default();
            return Err(ApiError::Status { status, message });
        }
        Ok(res)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let res = self.send("GET", path, self.client.get(self.url(path)))?;
        res.json::<T>()
            .map_err(|e| ApiError::BadResponse(format!("{}: {}", path, e)))
    }
}

impl AttendanceApi for HttpApi {
    fn grade(&self, grade_id: i64) -> Result<GradeDetail, ApiError> {
        self.get_json(&format!("/gradosacademicos/{}", grade_id))
    }

    fn grade_attendance(&self, grade_id: i64) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.get_json(&format!("/asistencias/reportegrado/{}", grade_id))
    }

    fn create_attendance(&self, payload: &AttendancePayload) -> Result<AttendanceRecord, ApiError> {
        let path = "/asistencias";
        let res = self.send("POST", path, self.client.post(self.url(path)).json(payload))?;
        res.json::<AttendanceRecord>()
            .map_err(|e| ApiError::BadResponse(format!("{}: {}", path, e)))
    }

    fn update_attendance(&self, id: i64, payload: &AttendancePayload) -> Result<(), ApiError> {
        let path = format!("/asistencias/{}", id);
        self.send("PATCH", &path, self.client.patch(self.url(&path)).json(payload))?;
        Ok(())
    }

    fn upsert_batch(&self, rows: &[BatchRow]) -> Result<(), ApiError> {
        let path = "/asistencias/lote";
        let body = serde_json::json!({ "registros": rows });
        self.send("POST", path, self.client.post(self.url(path)).json(&body))?;
        Ok(())
    }
}
