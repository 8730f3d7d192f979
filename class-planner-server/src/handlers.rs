use std::{convert::Infallible, sync::Arc};

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use class_planner_core::prelude::*;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

const SESSION_COOKIE: &str = "planner_session";

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<Planner>,
    pub sessions: SessionStore,
}

/// 健康检查响应
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    offerings: usize,
}

/// 错误响应
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicts: Option<Vec<Conflict>>,
}

#[derive(Deserialize)]
struct SemesterQuery {
    semester: Option<String>,
}

/// 课程搜索参数
#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    department: Option<String>,
    semester: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

#[derive(Deserialize)]
struct AddRequest {
    course_code: String,
    subclass: String,
    semester: Option<String>,
}

#[derive(Deserialize)]
struct RemoveRequest {
    course_code: String,
    semester: Option<String>,
}

/// 由 `planner_session` cookie 标识的会话，首次访问时分配新的 UUID
struct Session {
    id: String,
    fresh: bool,
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let existing = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, value)| Uuid::parse_str(value).ok());

        Ok(match existing {
            Some(id) => Self {
                id: id.to_string(),
                fresh: false,
            },
            None => Self {
                id: Uuid::new_v4().to_string(),
                fresh: true,
            },
        })
    }
}

impl Session {
    /// 新会话在响应中下发 cookie
    fn attach(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if self.fresh {
            let cookie = format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}

pub fn create_app(state: AppState, url_prefix: &str) -> Router {
    let routes = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/courses", get(search_courses_handler))
        .route("/api/departments", get(departments_handler))
        .route("/api/semesters", get(semesters_handler))
        .route("/api/course/{code}", get(course_detail_handler))
        .route("/api/schedule", get(get_schedule_handler).post(add_to_schedule_handler))
        .route("/api/schedule/remove", post(remove_from_schedule_handler))
        .route("/api/schedule/conflicts", get(conflicts_handler))
        .route("/api/schedule/export-ics", get(export_ics_handler))
        .with_state(state);

    let router = if url_prefix.is_empty() {
        routes
    } else {
        Router::new().nest(url_prefix, routes)
    };

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

/// 根路径处理器
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Class Planner Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Timetable search, conflict checking and ICS export",
        "endpoints": {
            "health": "/health",
            "courses": "/api/courses",
            "departments": "/api/departments",
            "semesters": "/api/semesters",
            "course": "/api/course/{code}",
            "schedule": "/api/schedule",
            "conflicts": "/api/schedule/conflicts",
            "export": "/api/schedule/export-ics"
        }
    }))
}

/// 健康检查处理器
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        offerings: state.planner.catalog().len(),
    })
}

/// 搜索课程
async fn search_courses_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    let page = state.planner.search(
        params.q.as_deref().unwrap_or_default(),
        params.department.as_deref().unwrap_or_default(),
        params.semester.as_deref(),
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(Page::<()>::DEFAULT_PER_PAGE),
    );
    Json(page).into_response()
}

async fn departments_handler(
    State(state): State<AppState>,
    Query(params): Query<SemesterQuery>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "departments": state.planner.departments(params.semester.as_deref())
    }))
}

async fn semesters_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "semesters": state.planner.semesters()
    }))
}

/// 课程详情
async fn course_detail_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(params): Query<SemesterQuery>,
) -> Result<Response, AppError> {
    let offering = state
        .planner
        .course(&code, params.semester.as_deref())
        .ok_or_else(|| AppError::NotFound(format!("Course {code} not found")))?;
    Ok(Json(offering).into_response())
}

/// 当前会话的课表
async fn get_schedule_handler(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SemesterQuery>,
) -> Result<Response, AppError> {
    let book = state.sessions.load(&session.id).await?;
    let semester = params.semester.as_deref();
    let items = state.planner.schedule_items(&book, semester);

    Ok(session.attach(Json(serde_json::json!({
        "semester": resolve_semester(semester),
        "items": items,
    }))))
}

/// 加入课表；冲突时返回 400 以及冲突列表
async fn add_to_schedule_handler(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddRequest>,
) -> Result<Response, AppError> {
    let _guard = state.sessions.lock(&session.id).await;
    let mut book = state.sessions.load(&session.id).await?;
    let item = state.planner.add_to_schedule(
        &mut book,
        &request.course_code,
        &request.subclass,
        request.semester.as_deref(),
    )?;
    state.sessions.save(&session.id, &book).await?;

    Ok(session.attach(Json(serde_json::json!({
        "success": true,
        "item": item,
    }))))
}

async fn remove_from_schedule_handler(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<RemoveRequest>,
) -> Result<Response, AppError> {
    let _guard = state.sessions.lock(&session.id).await;
    let mut book = state.sessions.load(&session.id).await?;
    let removed = state.planner.remove_from_schedule(
        &mut book,
        &request.course_code,
        request.semester.as_deref(),
    );
    if removed {
        state.sessions.save(&session.id, &book).await?;
    }

    Ok(session.attach(Json(serde_json::json!({
        "success": removed,
    }))))
}

async fn conflicts_handler(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SemesterQuery>,
) -> Result<Response, AppError> {
    let book = state.sessions.load(&session.id).await?;
    let conflicts = state
        .planner
        .check_conflicts(&book, params.semester.as_deref());

    Ok(session.attach(Json(serde_json::json!({
        "has_conflicts": !conflicts.is_empty(),
        "conflicts": conflicts,
    }))))
}

/// 导出 ICS
async fn export_ics_handler(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SemesterQuery>,
) -> Result<Response, AppError> {
    let semester = resolve_semester(params.semester.as_deref())
        .ok_or(class_planner_core::Error::EmptySchedule)?;
    let book = state.sessions.load(&session.id).await?;
    let ics_content = state
        .planner
        .export_calendar(&book, Some(semester.as_str()))?;

    let disposition = format!("attachment; filename=schedule_{semester}.ics");

    Ok(session.attach((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        ics_content,
    )))
}

/// 应用错误类型
#[derive(Debug)]
enum AppError {
    Core(class_planner_core::Error),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        use class_planner_core::Error;

        let core = match self {
            Self::NotFound(message) => {
                let body = Json(ErrorResponse {
                    error: "未找到".to_string(),
                    message,
                    conflicts: None,
                });
                return (StatusCode::NOT_FOUND, body).into_response();
            }
            Self::Core(e) => e,
        };

        let (status, error_message) = match &core {
            Error::InvalidSelection { .. } => (StatusCode::BAD_REQUEST, "无效的课程或教学班"),
            Error::DuplicateCourse(_) => (StatusCode::BAD_REQUEST, "课程已在课表中"),
            Error::TimeConflict { .. } => (StatusCode::BAD_REQUEST, "时间冲突"),
            Error::EmptySchedule => (StatusCode::BAD_REQUEST, "课表为空"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "内部服务器错误"),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", core);
        }

        let message = core.to_string();
        let conflicts = match core {
            Error::TimeConflict { conflicts } => Some(conflicts),
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            message,
            conflicts,
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<class_planner_core::Error>,
{
    fn from(err: E) -> Self {
        Self::Core(err.into())
    }
}
