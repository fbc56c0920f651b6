//! The HTTP interface of finviz.
//!
//! - `POST /api/finances/upload/:user_id/:year` takes a multipart `file` field holding an `.xlsx`
//!   spreadsheet and replaces the user's records for that year.
//! - `GET /api/finances/:user_id/:year` returns the user's records for that year in calendar
//!   order.
//! - `GET /api/health` is a liveness probe.
//!
//! Every other path is served from the dashboard directory, when one is configured. Errors are
//! returned as `{"error": "...", "details": "..."}` with a status code that reflects the kind of
//! failure.

use crate::commands;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{FinanceReport, Year};
use crate::staging::StagedUpload;
use crate::{Config, Result};
use anyhow::Context;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// The multipart field that carries the spreadsheet.
const FILE_FIELD: &str = "file";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLSX_EXTENSION: &str = ".xlsx";
/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const NO_FILE: &str = "No file uploaded";
const ONLY_XLSX: &str = "Only .xlsx files are allowed";
const INVALID_YEAR: &str = "Invalid year, expected four digits";

#[derive(Debug, Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Builds the application router.
pub fn router(config: Config) -> Router {
    let body_limit = usize::try_from(config.upload_limit())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let frontend = config.frontend_dir();
    let state = AppState {
        config: Arc::new(config),
    };

    let api = Router::new()
        .route("/api/health", get(health))
        .route("/api/finances/upload/:user_id/:year", post(upload_file))
        .route("/api/finances/:user_id/:year", get(get_finances))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let app = match frontend {
        Some(dir) => {
            debug!("Serving the dashboard from {}", dir.display());
            api.fallback_service(ServeDir::new(dir))
        }
        None => api,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Binds to the configured port on all interfaces and serves until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))
        .pub_result(ErrorType::Config)?;
    info!("Server running on http://localhost:{}", config.port());

    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("The HTTP server stopped unexpectedly")
        .pub_result(ErrorType::Config)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => warn!("Unable to listen for Ctrl-C, the server must be killed to stop: {e}"),
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: String,
    records_processed: usize,
}

async fn upload_file(
    State(state): State<AppState>,
    Path((user_id, year)): Path<(String, String)>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let year = parse_year(&year)?;
    let config = state.config.as_ref();

    let (file_name, bytes) = receive_file(multipart, config.upload_limit())
        .await?
        .ok_or_else(|| Error::new(ErrorType::UploadRejected, NO_FILE))?;
    let staged = StagedUpload::write(config.uploads(), file_name, bytes).await?;

    let out = commands::upload(config, &user_id, year, staged).await?;
    let records_processed = out
        .structure()
        .map(|s| s.records_processed)
        .unwrap_or_default();
    Ok(Json(UploadResponse {
        message: out.message().to_string(),
        records_processed,
    }))
}

async fn get_finances(
    State(state): State<AppState>,
    Path((user_id, year)): Path<(String, String)>,
) -> Result<Json<FinanceReport>> {
    let year = parse_year(&year)?;
    let out = commands::retrieve(state.config.as_ref(), &user_id, year).await?;
    out.into_structure()
        .map(Json)
        .ok_or_else(|| Error::new(ErrorType::Storage, "Failed to retrieve data"))
}

fn parse_year(s: &str) -> Result<Year> {
    Year::from_str(s).map_err(|e| Error::with_source(ErrorType::BadRequest, INVALID_YEAR, e))
}

/// Reads the `file` field of the multipart body, enforcing the file type and size limit. Returns
/// `None` if there is no `file` field.
async fn receive_file(
    multipart: std::result::Result<Multipart, MultipartRejection>,
    limit: u64,
) -> Result<Option<(String, Vec<u8>)>> {
    let mut multipart = multipart.map_err(|e| {
        Error::with_source(ErrorType::UploadRejected, NO_FILE, anyhow::anyhow!(e.body_text()))
    })?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !is_xlsx(&file_name, &content_type) {
            debug!("Rejected '{file_name}' with content type '{content_type}'");
            return Err(Error::new(ErrorType::UploadRejected, ONLY_XLSX));
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, limit))?
        {
            if (bytes.len() + chunk.len()) as u64 > limit {
                return Err(too_large(limit));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(Some((file_name, bytes)));
    }
    Ok(None)
}

fn is_xlsx(file_name: &str, content_type: &str) -> bool {
    content_type == XLSX_MIME || file_name.to_lowercase().ends_with(XLSX_EXTENSION)
}

fn multipart_error(e: MultipartError, limit: u64) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(limit);
    }
    Error::with_source(
        ErrorType::UploadRejected,
        "Unable to read the uploaded file",
        anyhow::anyhow!(e.body_text()),
    )
}

fn too_large(limit: u64) -> Error {
    const MIB: u64 = 1024 * 1024;
    let max = if limit >= MIB && limit % MIB == 0 {
        format!("{}MB", limit / MIB)
    } else {
        format!("{limit} bytes")
    };
    Error::new(
        ErrorType::UploadRejected,
        format!("File too large. Maximum size is {max}"),
    )
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn status(error_type: ErrorType) -> StatusCode {
    match error_type {
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::InvalidFormat | ErrorType::UploadRejected | ErrorType::BadRequest => {
            StatusCode::BAD_REQUEST
        }
        ErrorType::Storage | ErrorType::Filesystem | ErrorType::Config | ErrorType::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status(self.error_type());
        let details = self.details();
        if status.is_server_error() {
            error!("{}: {}", self.message(), details.as_deref().unwrap_or(""));
        } else {
            debug!("{} ({})", self.message(), self.error_type());
        }
        let body = ErrorBody {
            error: self.message().to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{as_rows, month_rows, xlsx_bytes, TestEnv};
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "finvizTestBoundary";
    const UPLOAD_URI: &str = "/api/finances/upload/u1/2024";

    /// A form part: field name, file name, content type and contents.
    type Part<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

    fn multipart_parts(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body = Vec::new();
        for (field, file_name, mime, data) in parts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                     filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn multipart_request(
        uri: &str,
        field: &str,
        file_name: &str,
        mime: &str,
        data: &[u8],
    ) -> Request<Body> {
        multipart_parts(uri, &[(field, file_name, mime, data)])
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn example_xlsx() -> Vec<u8> {
        let rows = month_rows(&[("March", -20.0), ("January", 100.5)]);
        xlsx_bytes(&as_rows(&rows))
    }

    #[tokio::test]
    async fn test_upload_then_get() {
        let env = TestEnv::new().await;
        let (status, json) = send(
            router(env.config()),
            multipart_request(
                "/api/finances/upload/u1/2024",
                FILE_FIELD,
                "year.xlsx",
                XLSX_MIME,
                &example_xlsx(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "File processed successfully");
        assert_eq!(json["recordsProcessed"], 2);
        assert_eq!(env.staged_files(), 0);

        let (status, json) = send(router(env.config()), get("/api/finances/u1/2024")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["user"]["name"], "Ada");
        assert_eq!(json["year"], 2024);
        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["month"], "January");
        assert_eq!(records[0]["amount"], 100.5);
        assert_eq!(records[1]["month"], "March");
        assert_eq!(records[1]["amount"], -20.0);
    }

    #[tokio::test]
    async fn test_extension_alone_is_enough() {
        let env = TestEnv::new().await;
        let (status, _) = send(
            router(env.config()),
            multipart_request(
                "/api/finances/upload/u1/2024",
                FILE_FIELD,
                "Year.XLSX",
                "application/octet-stream",
                &example_xlsx(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let env = TestEnv::new().await;
        let (status, json) = send(router(env.config()), get("/api/finances/ghost/2024")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "User not found");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_upload_unknown_user() {
        let env = TestEnv::new().await;
        let (status, json) = send(
            router(env.config()),
            multipart_request(
                "/api/finances/upload/ghost/2024",
                FILE_FIELD,
                "year.xlsx",
                XLSX_MIME,
                &example_xlsx(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "User not found");
        assert_eq!(env.staged_files(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_other_file_types() {
        let env = TestEnv::new().await;
        let (status, json) = send(
            router(env.config()),
            multipart_request(
                "/api/finances/upload/u1/2024",
                FILE_FIELD,
                "year.csv",
                "text/csv",
                b"Month,Amount\nJanuary,1\n",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], ONLY_XLSX);
        assert_eq!(env.staged_files(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let env = TestEnv::new().await;
        let (status, json) = send(
            router(env.config()),
            multipart_request(
                "/api/finances/upload/u1/2024",
                "attachment",
                "year.xlsx",
                XLSX_MIME,
                &example_xlsx(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], NO_FILE);
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let env = TestEnv::new().await;
        let mut config = env.config();
        config.set_upload_limit(100);
        let (status, json) = send(
            router(config),
            multipart_request(
                "/api/finances/upload/u1/2024",
                FILE_FIELD,
                "year.xlsx",
                XLSX_MIME,
                &example_xlsx(),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "File too large. Maximum size is 100 bytes");
        assert!(env.records("u1", 2024).await.is_empty());
    }

    #[tokio::test]
    async fn test_body_over_the_server_limit_is_too_large() {
        let env = TestEnv::new().await;
        // The oversized part comes first so the body limit trips while it is skipped, before the
        // handler sees any bytes of the file.
        let padding = vec![b'x'; 10 * 1024 * 1024 + 2 * MULTIPART_OVERHEAD];
        let xlsx = example_xlsx();
        let request = multipart_parts(
            UPLOAD_URI,
            &[
                ("padding", "padding.txt", "text/plain", padding.as_slice()),
                (FILE_FIELD, "year.xlsx", XLSX_MIME, xlsx.as_slice()),
            ],
        );
        let (status, json) = send(router(env.config()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "File too large. Maximum size is 10MB");
        assert_eq!(env.staged_files(), 0);
        assert!(env.records("u1", 2024).await.is_empty());
    }

    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];

    fn records_of(json: &Value) -> Vec<(String, f64)> {
        json["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| {
                (
                    r["month"].as_str().unwrap().to_string(),
                    r["amount"].as_f64().unwrap(),
                )
            })
            .collect()
    }

    fn upload_request(rows: &[(&'static str, f64)]) -> Request<Body> {
        let rows = month_rows(rows);
        let xlsx = xlsx_bytes(&as_rows(&rows));
        multipart_request(UPLOAD_URI, FILE_FIELD, "year.xlsx", XLSX_MIME, &xlsx)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_uploads_leave_one_complete_set() {
        let env = TestEnv::new().await;
        let (status, _) = send(router(env.config()), upload_request(&[("May", 99.0)])).await;
        assert_eq!(status, StatusCode::OK);
        let before = vec![("May".to_string(), 99.0)];

        // Each upload writes two months that no other upload writes.
        let sets: Vec<Vec<(&'static str, f64)>> = (0..6)
            .map(|k| vec![(MONTHS[k], k as f64 + 1.0), (MONTHS[k + 6], k as f64 + 1.0)])
            .collect();
        let after: Vec<Vec<(String, f64)>> = sets
            .iter()
            .map(|set| set.iter().map(|(m, a)| (m.to_string(), *a)).collect())
            .collect();

        let uploads: Vec<_> = sets
            .iter()
            .map(|set| tokio::spawn(send(router(env.config()), upload_request(set))))
            .collect();
        let reads: Vec<_> = (0..12)
            .map(|_| tokio::spawn(send(router(env.config()), get("/api/finances/u1/2024"))))
            .collect();

        for upload in uploads {
            let (status, json) = upload.await.unwrap();
            assert_eq!(status, StatusCode::OK, "{json}");
        }
        for read in reads {
            let (status, json) = read.await.unwrap();
            assert_eq!(status, StatusCode::OK);
            let seen = records_of(&json);
            assert!(
                seen == before || after.contains(&seen),
                "a reader saw a partial replacement: {seen:?}"
            );
        }

        let (_, json) = send(router(env.config()), get("/api/finances/u1/2024")).await;
        let last = records_of(&json);
        assert!(after.contains(&last), "unexpected final records: {last:?}");
        assert_eq!(env.staged_files(), 0);
    }

    #[tokio::test]
    async fn test_upload_invalid_format() {
        let env = TestEnv::new().await;
        let (status, json) = send(
            router(env.config()),
            multipart_request(
                "/api/finances/upload/u1/2024",
                FILE_FIELD,
                "year.xlsx",
                XLSX_MIME,
                b"definitely not a zip archive",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"],
            "Invalid Excel format. Required columns: Month, Amount"
        );
        assert_eq!(env.staged_files(), 0);
    }

    #[tokio::test]
    async fn test_bad_year() {
        let env = TestEnv::new().await;
        let (status, json) = send(router(env.config()), get("/api/finances/u1/24")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], INVALID_YEAR);
    }

    #[tokio::test]
    async fn test_health() {
        let env = TestEnv::new().await;
        let (status, json) = send(router(env.config()), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_serves_dashboard() {
        let env = TestEnv::new().await;
        let mut config = env.config();
        let web = config.root().join("web");
        std::fs::create_dir_all(&web).unwrap();
        std::fs::write(web.join("index.html"), "<html>dashboard</html>").unwrap();
        config.set_frontend_dir(web);

        let response = router(config).oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"<html>dashboard</html>");
    }

    #[test]
    fn test_too_large_message() {
        assert_eq!(
            too_large(10 * 1024 * 1024).message(),
            "File too large. Maximum size is 10MB"
        );
    }
}
