//! HTTP surface of the booking calendar.
//!
//! Handlers are thin: they decode the request, hop onto a blocking thread for
//! the SQLite call, and shape the JSON reply. Every failure answers with the
//! `{status: "error", message}` envelope; caller mistakes are 400, everything
//! else 500.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rehearsal_core::booking::{
    self, BookingWindow, DateView, admin_overview, booking_window, query_date_view,
    stage_slot_change, submit_reservation,
};
use rehearsal_core::cutover::{CutoverEngine, Trigger};
use rehearsal_core::date_key::{DateKey, days_from};
use rehearsal_core::store::pending::PendingChange;
use rehearsal_core::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

/// Shared handler state. Cloned per request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: CutoverEngine,
    pub window_days: u32,
}

impl AppState {
    pub const fn new(engine: CutoverEngine, window_days: u32) -> Self {
        Self {
            engine,
            window_days,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_time_slots/:year/:month/:day", get(get_time_slots))
        .route("/submit_practice", post(submit_practice))
        .route("/admin/update_time_slots", post(update_time_slots))
        .route("/admin/apply_changes_now", post(apply_changes_now))
        .route(
            "/admin/initialize_default_slots",
            post(initialize_default_slots),
        )
        .route("/admin/overview", get(overview))
        .route("/calendar", get(calendar))
        .route("/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    const fn status_code(&self) -> StatusCode {
        let caller_fault = match self {
            Self::Core(err) => err.is_validation(),
            Self::BadRequest(_) => true,
            Self::Internal(_) => false,
        };
        if caller_fault {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            Self::Core(err) => err.code(),
            Self::BadRequest(_) => ErrorCode::InvalidRequest,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = match self {
            Self::Core(err) => err.to_string(),
            Self::BadRequest(message) | Self::Internal(message) => message,
        };

        if status.is_server_error() {
            error!(code = %code, error = %message, "request failed");
        } else {
            warn!(code = %code, error = %message, "request rejected");
        }

        let body = json!({
            "status": "error",
            "message": message,
            "code": code.code(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a store call on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> rehearsal_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(format!("store task aborted: {err}")))?
        .map_err(ApiError::from)
}

// ---------------------------------------------------------------------------
// Booking routes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BookedUserBody {
    pub name: String,
    pub band_name: String,
}

#[derive(Debug, Serialize)]
pub struct TimeSlotBody {
    pub id: String,
    pub label: String,
    pub users: Vec<BookedUserBody>,
}

#[derive(Debug, Serialize)]
pub struct TimeSlotsResponse {
    pub time_slots: Vec<TimeSlotBody>,
    pub selected: Option<String>,
}

impl From<DateView> for TimeSlotsResponse {
    fn from(view: DateView) -> Self {
        let time_slots = view
            .slots
            .into_iter()
            .map(|slot| TimeSlotBody {
                id: slot.label.clone(),
                label: slot.label,
                users: slot
                    .users_booked
                    .into_iter()
                    .map(|user| BookedUserBody {
                        name: user.name,
                        band_name: user.band_name,
                    })
                    .collect(),
            })
            .collect();
        Self {
            time_slots,
            selected: None,
        }
    }
}

async fn get_time_slots(
    State(state): State<AppState>,
    path: Result<Path<(i32, u32, u32)>, PathRejection>,
) -> ApiResult<TimeSlotsResponse> {
    let Path((year, month, day)) = path?;
    let date_key = DateKey::from_ymd(year, month, day)?;
    let db = state.engine.database().clone();
    let view = blocking(move || query_date_view(&db, &date_key)).await?;
    Ok(Json(view.into()))
}

#[derive(Debug, Deserialize)]
pub struct SubmitPracticeRequest {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub band_name: String,
    #[serde(default)]
    pub time_slot: String,
}

async fn submit_practice(
    State(state): State<AppState>,
    body: Result<Json<SubmitPracticeRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = body?;
    let date_key = DateKey::from_ymd(request.year, request.month, request.day)?;
    let db = state.engine.database().clone();
    blocking(move || {
        submit_reservation(
            &db,
            &date_key,
            &request.user_name,
            &request.band_name,
            &request.time_slot,
        )
    })
    .await?;
    Ok(Json(json!({ "status": "success" })))
}

async fn calendar(State(state): State<AppState>) -> Json<BookingWindow> {
    let today = state.engine.clock().today();
    Json(booking_window(today, state.window_days))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Admin routes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateTimeSlotsRequest {
    pub date: Option<String>,
    pub slots: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct UpdateTimeSlotsResponse {
    pub status: &'static str,
    pub message: String,
    pub date_key: DateKey,
    pub pending: PendingChange,
}

async fn update_time_slots(
    State(state): State<AppState>,
    body: Result<Json<UpdateTimeSlotsRequest>, JsonRejection>,
) -> ApiResult<UpdateTimeSlotsResponse> {
    let Json(request) = body?;
    let (Some(date), Some(slots)) = (request.date, request.slots) else {
        return Err(Error::validation(
            ErrorCode::InvalidRequest,
            "both 'date' and 'slots' are required",
        )
        .into());
    };
    let date_key = DateKey::parse_wire(&date)?;

    let db = state.engine.database().clone();
    let pending = blocking(move || stage_slot_change(&db, &date_key, &slots)).await?;
    let message = match &pending {
        PendingChange::Replace(labels) => format!(
            "staged {} slot(s) for {date_key}; they go live at the next cutover",
            labels.len()
        ),
        _ => format!("staged clearing {date_key}; it goes empty at the next cutover"),
    };
    Ok(Json(UpdateTimeSlotsResponse {
        status: "success",
        message,
        date_key,
        pending,
    }))
}

#[derive(Debug, Serialize)]
pub struct ApplyChangesResponse {
    pub status: &'static str,
    pub message: String,
    pub promoted: Vec<DateKey>,
    pub seeded: Vec<DateKey>,
}

async fn apply_changes_now(State(state): State<AppState>) -> ApiResult<ApplyChangesResponse> {
    let engine = state.engine.clone();
    let report = blocking(move || engine.apply(Trigger::Manual)).await?;
    info!(summary = %report.summary(), "manual cutover via admin route");
    Ok(Json(ApplyChangesResponse {
        status: "success",
        message: report.summary(),
        promoted: report.promoted,
        seeded: report.seeded,
    }))
}

#[derive(Debug, Serialize)]
pub struct InitializeResponse {
    pub status: &'static str,
    pub message: String,
    pub seeded: Vec<DateKey>,
}

async fn initialize_default_slots(
    State(state): State<AppState>,
) -> ApiResult<InitializeResponse> {
    let engine = state.engine.clone();
    let seeded = blocking(move || engine.initialize_default_slots()).await?;
    Ok(Json(InitializeResponse {
        status: "success",
        message: format!("seeded default slots for {} date(s)", seeded.len()),
        seeded,
    }))
}

async fn overview(State(state): State<AppState>) -> ApiResult<booking::AdminOverview> {
    let dates = days_from(state.engine.clock().today(), state.window_days);
    let db = state.engine.database().clone();
    let overview = blocking(move || admin_overview(&db, &dates)).await?;
    Ok(Json(overview))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use rehearsal_core::schedule::FixedClock;
    use rehearsal_core::store::Database;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let db = Database::open_in_memory().expect("open");
        let today = NaiveDate::from_ymd_opt(2024, 6, 5).expect("date");
        let engine = CutoverEngine::new(db, Arc::new(FixedClock::on(today)));
        AppState::new(engine, 14)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).expect("json body");
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = send(router(test_state()), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn unseeded_date_returns_empty_slot_list() {
        let (status, body) =
            send(router(test_state()), get_req("/get_time_slots/2024/6/10")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "time_slots": [], "selected": null }));
    }

    #[tokio::test]
    async fn booking_shows_up_under_its_slot() {
        let state = test_state();
        let (status, _) = send(
            router(state.clone()),
            post_empty("/admin/initialize_default_slots"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            router(state.clone()),
            post_json(
                "/submit_practice",
                &json!({
                    "year": 2024, "month": 6, "day": 10,
                    "user_name": "taro", "band_name": "The Rests",
                    "time_slot": "16:50〜18:00"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success" }));

        let (_, body) = send(router(state), get_req("/get_time_slots/2024/6/10")).await;
        assert_eq!(
            body,
            json!({
                "time_slots": [
                    { "id": "〜16:50", "label": "〜16:50", "users": [] },
                    {
                        "id": "16:50〜18:00",
                        "label": "16:50〜18:00",
                        "users": [{ "name": "taro", "band_name": "The Rests" }]
                    }
                ],
                "selected": null
            })
        );
    }

    #[tokio::test]
    async fn blank_booking_fields_are_rejected() {
        let (status, body) = send(
            router(test_state()),
            post_json(
                "/submit_practice",
                &json!({ "year": 2024, "month": 6, "day": 10, "user_name": "  ", "time_slot": "a" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "E1001");
        let message = body["message"].as_str().expect("message");
        assert!(message.contains("user name"));
        assert!(message.contains("band name"));
    }

    #[tokio::test]
    async fn impossible_dates_are_rejected() {
        let (status, body) =
            send(router(test_state()), get_req("/get_time_slots/2024/2/30")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E1002");

        let (status, body) =
            send(router(test_state()), get_req("/get_time_slots/2024/june/1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn malformed_json_uses_error_envelope() {
        let request = Request::builder()
            .method("POST")
            .uri("/submit_practice")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, body) = send(router(test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "E1003");
    }

    #[tokio::test]
    async fn staged_clear_applies_only_on_cutover() {
        let state = test_state();
        send(
            router(state.clone()),
            post_empty("/admin/initialize_default_slots"),
        )
        .await;

        let (status, body) = send(
            router(state.clone()),
            post_json(
                "/admin/update_time_slots",
                &json!({ "date": "2024-06-10", "slots": [] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["date_key"], "2024-6-10");
        assert_eq!(body["pending"], json!({ "action": "clear" }));

        let (_, before) = send(router(state.clone()), get_req("/get_time_slots/2024/6/10")).await;
        assert_eq!(before["time_slots"].as_array().map(Vec::len), Some(2));

        let (status, report) =
            send(router(state.clone()), post_empty("/admin/apply_changes_now")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["promoted"], json!(["2024-6-10"]));
        assert_eq!(report["seeded"].as_array().map(Vec::len), Some(7));

        let (_, after) = send(router(state.clone()), get_req("/get_time_slots/2024/6/10")).await;
        assert_eq!(after["time_slots"], json!([]));
        let (_, neighbour) = send(router(state), get_req("/get_time_slots/2024/6/11")).await;
        assert_eq!(neighbour["time_slots"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn update_requires_date_and_slots() {
        let (status, body) = send(
            router(test_state()),
            post_json("/admin/update_time_slots", &json!({ "date": "2024-06-10" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, body) = send(
            router(test_state()),
            post_json(
                "/admin/update_time_slots",
                &json!({ "date": "2024-13-01", "slots": ["a"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E1002");
    }

    #[tokio::test]
    async fn overview_lists_pending_edits() {
        let state = test_state();
        send(
            router(state.clone()),
            post_json(
                "/admin/update_time_slots",
                &json!({ "date": "2024-06-06", "slots": ["19:00〜21:00"] }),
            ),
        )
        .await;

        let (status, body) = send(router(state), get_req("/admin/overview")).await;
        assert_eq!(status, StatusCode::OK);
        let days = body["days"].as_array().expect("days");
        assert_eq!(days.len(), 14);
        assert_eq!(days[0]["date_key"], "2024-6-5");
        assert_eq!(
            days[1]["pending"],
            json!({ "action": "replace", "slots": ["19:00〜21:00"] })
        );
        assert_eq!(body["last_cutover"], Value::Null);
    }

    #[tokio::test]
    async fn calendar_lists_booking_window() {
        let (status, body) = send(router(test_state()), get_req("/calendar")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["today"], "2024-6-5");
        assert_eq!(body["dates"].as_array().map(Vec::len), Some(14));
        assert_eq!(body["months"], json!([{ "year": 2024, "month": 6 }]));
    }

    #[tokio::test]
    async fn failed_cutover_answers_500() {
        let state = test_state();
        state
            .engine
            .database()
            .write(|tx| {
                tx.execute_batch("DROP TABLE calendar_meta")
                    .map_err(|err| Error::Corrupt(err.to_string()))
            })
            .expect("drop meta");

        let (status, body) = send(router(state), post_empty("/admin/apply_changes_now")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "E4001");
    }

    #[tokio::test]
    async fn negative_year_booking_is_rejected() {
        let state = test_state();
        let (status, body) = send(
            router(state.clone()),
            post_json(
                "/submit_practice",
                &json!({
                    "year": -1, "month": 1, "day": 1,
                    "user_name": "taro", "band_name": "The Rests", "time_slot": "a",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "E1002");

        let (status, _) = send(router(state), get_req("/admin/overview")).await;
        assert_eq!(status, StatusCode::OK);
    }

    fn broken_slot_store() -> AppState {
        let state = test_state();
        state
            .engine
            .database()
            .write(|tx| {
                tx.execute_batch("DROP TABLE time_slots")
                    .map_err(|err| Error::Corrupt(err.to_string()))
            })
            .expect("drop time_slots");
        state
    }

    #[tokio::test]
    async fn slot_read_failure_answers_500_not_empty() {
        let (status, body) = send(
            router(broken_slot_store()),
            get_req("/get_time_slots/2024/6/10"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "E3001");
        assert!(body.get("time_slots").is_none());
    }

    #[tokio::test]
    async fn overview_read_failure_answers_500() {
        let (status, body) = send(router(broken_slot_store()), get_req("/admin/overview")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "E3001");
    }
}
