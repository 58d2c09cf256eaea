//! REST access to the school portal.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::Session;
use crate::error::ApiError;
use crate::types::{
    AttendanceRecord, ClassId, ClassSection, StatusEntry, Student, Subject, SubjectId,
};

/// The calls the attendance workflow makes against the portal.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn teacher_classes(&self) -> Result<Vec<ClassSection>, ApiError>;

    async fn teacher_subjects(&self) -> Result<Vec<Subject>, ApiError>;

    async fn class_roster(&self, class_id: ClassId) -> Result<Vec<Student>, ApiError>;

    /// Stored statuses for a class on a date, optionally narrowed to one subject.
    async fn class_attendance(
        &self,
        class_id: ClassId,
        subject_id: Option<SubjectId>,
        date: NaiveDate,
    ) -> Result<Vec<StatusEntry>, ApiError>;

    async fn record_attendance(&self, record: &AttendanceRecord) -> Result<(), ApiError>;
}

/// `AttendanceApi` over HTTP with a bearer token on every request.
pub struct HttpApi {
    client: Client,
    base_url: String,
    teacher_id: i64,
}

impl HttpApi {
    pub fn new(session: &Session) -> Result<Self, ApiError> {
        reqwest::Url::parse(&session.api_url)
            .map_err(|e| ApiError::Url(format!("{}: {}", session.api_url, e)))?;

        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", session.token))
            .map_err(|_| ApiError::Token)?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: session.api_url.trim_end_matches('/').to_string(),
            teacher_id: session.teacher_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self.client.get(&url).query(query).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AttendanceApi for HttpApi {
    async fn teacher_classes(&self) -> Result<Vec<ClassSection>, ApiError> {
        self.get_json(&format!("/teachers/{}/classes", self.teacher_id), &[])
            .await
    }

    async fn teacher_subjects(&self) -> Result<Vec<Subject>, ApiError> {
        self.get_json(&format!("/teachers/{}/subjects", self.teacher_id), &[])
            .await
    }

    async fn class_roster(&self, class_id: ClassId) -> Result<Vec<Student>, ApiError> {
        self.get_json(
            &format!("/teachers/{}/classes/{}/students", self.teacher_id, class_id),
            &[],
        )
        .await
    }

    async fn class_attendance(
        &self,
        class_id: ClassId,
        subject_id: Option<SubjectId>,
        date: NaiveDate,
    ) -> Result<Vec<StatusEntry>, ApiError> {
        let mut query = vec![("date", date.format("%Y-%m-%d").to_string())];
        if let Some(subject_id) = subject_id {
            query.push(("subjectId", subject_id.to_string()));
        }
        self.get_json(&format!("/attendance/status/class/{}", class_id), &query)
            .await
    }

    async fn record_attendance(&self, record: &AttendanceRecord) -> Result<(), ApiError> {
        let url = self.url("/attendance/record");
        debug!(
            url = %url,
            student_id = record.student_id(),
            date = %record.date(),
            status = %record.status(),
            "POST"
        );
        let response = self.client.post(&url).json(record).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(status, &body),
    })
}

/// Pick the human-readable message out of an error response.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error) {
            return message;
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("Unknown API error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttendanceStatus, RecordDraft};
    use axum::extract::{Json, Path, Query};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const TOKEN: &str = "test-token";

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false)
    }

    async fn classes(headers: HeaderMap) -> (AxumStatus, Json<Value>) {
        if !authorized(&headers) {
            return (
                AxumStatus::UNAUTHORIZED,
                Json(json!({"message": "Invalid token"})),
            );
        }
        (
            AxumStatus::OK,
            Json(json!([
                {"id": 1, "name": "3A", "subject_id": 4, "subject_name": "Mathematics"},
                {"id": 2, "name": "3B"}
            ])),
        )
    }

    async fn roster(Path((teacher, class)): Path<(i64, i64)>) -> Json<Value> {
        Json(json!([
            {"id": teacher * 100 + class, "first_name": "Ada", "last_name": "Byron", "avatar": null}
        ]))
    }

    async fn status(
        Path(class): Path<i64>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        // Echo the query back through the status field
        let status = match (params.get("date").map(String::as_str), params.get("subjectId")) {
            (Some("2024-02-01"), Some(_)) => "present",
            (Some("2024-02-01"), None) => "late",
            _ => "absent",
        };
        Json(json!([{ "student_id": class, "status": status }, { "student_id": 99, "status": null }]))
    }

    async fn record(Json(body): Json<Value>) -> (AxumStatus, String) {
        match body["studentId"].as_i64() {
            Some(13) => (
                AxumStatus::UNPROCESSABLE_ENTITY,
                json!({"message": "Student 13 is not enrolled in this subject"}).to_string(),
            ),
            Some(14) => (AxumStatus::INTERNAL_SERVER_ERROR, String::new()),
            _ => (AxumStatus::CREATED, json!({"ok": true}).to_string()),
        }
    }

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/api/teachers/{teacher}/classes", get(classes))
            .route("/api/teachers/{teacher}/classes/{class}/students", get(roster))
            .route("/api/attendance/status/class/{class}", get(status))
            .route("/api/attendance/record", post(record));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/api", addr)
    }

    fn api(base: &str, token: &str) -> HttpApi {
        HttpApi::new(&Session {
            api_url: base.to_string(),
            teacher_id: 5,
            token: token.to_string(),
        })
        .unwrap()
    }

    fn record_for(student_id: i64) -> AttendanceRecord {
        AttendanceRecord::try_from(RecordDraft {
            student_id,
            subject_id: Some(4),
            date: NaiveDate::from_ymd_opt(2024, 2, 1),
            status: AttendanceStatus::Present,
        })
        .unwrap()
    }

    #[test]
    fn test_error_message_prefers_message_field() {
        let msg = error_message(StatusCode::BAD_REQUEST, r#"{"message":"Bad date"}"#);
        assert_eq!(msg, "Bad date");

        let msg = error_message(StatusCode::BAD_REQUEST, r#"{"error":"Nope"}"#);
        assert_eq!(msg, "Nope");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, ""), "Not Found");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = HttpApi::new(&Session {
            api_url: "not a url".to_string(),
            teacher_id: 1,
            token: TOKEN.to_string(),
        });
        assert!(matches!(result, Err(ApiError::Url(_))));
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let base = spawn_server().await;

        let classes = api(&base, TOKEN).teacher_classes().await.unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].subject_id, Some(4));
        assert_eq!(classes[1].subject_name, None);
    }

    #[tokio::test]
    async fn test_wrong_token_surfaces_server_message() {
        let base = spawn_server().await;

        let err = api(&base, "wrong").teacher_classes().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Invalid token");
    }

    #[tokio::test]
    async fn test_roster_path_uses_teacher_and_class() {
        let base = spawn_server().await;

        let roster = api(&base, TOKEN).class_roster(7).await.unwrap();
        assert_eq!(roster[0].id, 507);
        assert_eq!(roster[0].full_name(), "Ada Byron");
    }

    #[tokio::test]
    async fn test_attendance_query_params() {
        let base = spawn_server().await;
        let client = api(&base, TOKEN);
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        let with_subject = client.class_attendance(3, Some(4), date).await.unwrap();
        assert_eq!(with_subject[0].status, Some(AttendanceStatus::Present));
        assert_eq!(with_subject[1].status, None);

        let without_subject = client.class_attendance(3, None, date).await.unwrap();
        assert_eq!(without_subject[0].status, Some(AttendanceStatus::Late));
    }

    #[tokio::test]
    async fn test_record_attendance_errors() {
        let base = spawn_server().await;
        let client = api(&base, TOKEN);

        client.record_attendance(&record_for(1)).await.unwrap();

        let err = client.record_attendance(&record_for(13)).await.unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "Student 13 is not enrolled in this subject");

        let err = client.record_attendance(&record_for(14)).await.unwrap_err();
        assert_eq!(err.to_string(), "Internal Server Error");
    }
}
