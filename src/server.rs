use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Config;
use crate::data::{Cell, ClassSubject, NewClassSubject, ScheduleSlot, TeacherAvailability, UnmetSubject};
use crate::error::{CurriculumUpdateError, GenerationError, InvalidSlotError, SourceError};
use crate::orchestrator::GenerationPhase;
use crate::service::TimetableService;

type AppState = Arc<TimetableService>;

/// Availability toggle as sent by clients; validated into a [`Cell`] here.
#[derive(Debug, Deserialize)]
struct AvailabilityRequest {
    #[serde(alias = "teacherId")]
    teacher_id: String,
    #[serde(alias = "dayOfWeek")]
    day_of_week: String,
    #[serde(alias = "slotIndex")]
    slot_index: i64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<GenerationPhase>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unmet_subjects: Vec<UnmetSubject>,
}

#[derive(Debug)]
pub enum ApiError {
    InvalidSlot(InvalidSlotError),
    Generation(GenerationError),
    Curriculum(CurriculumUpdateError),
    Source(SourceError),
}

impl From<InvalidSlotError> for ApiError {
    fn from(e: InvalidSlotError) -> Self {
        ApiError::InvalidSlot(e)
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        ApiError::Generation(e)
    }
}

impl From<CurriculumUpdateError> for ApiError {
    fn from(e: CurriculumUpdateError) -> Self {
        ApiError::Curriculum(e)
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        ApiError::Source(e)
    }
}

fn generation_status(e: &GenerationError) -> StatusCode {
    match e {
        GenerationError::EmptyCurriculum(_) => StatusCode::BAD_REQUEST,
        GenerationError::InvalidCurriculum(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GenerationError::SolverAborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        GenerationError::Unsatisfiable(_) | GenerationError::Commit(_) => StatusCode::CONFLICT,
        GenerationError::CurriculumUnavailable(_)
        | GenerationError::AvailabilityUnavailable(_)
        | GenerationError::StoreUnavailable(_)
        | GenerationError::ClassBusy { .. }
        | GenerationError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidSlot(e) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: e.to_string(),
                    phase: None,
                    unmet_subjects: Vec::new(),
                },
            ),
            ApiError::Generation(e) => {
                let status = generation_status(&e);
                let phase = Some(e.phase());
                let error = e.to_string();
                let unmet_subjects = match e {
                    GenerationError::Unsatisfiable(s) => s.unmet_subjects,
                    _ => Vec::new(),
                };
                (
                    status,
                    ErrorBody {
                        error,
                        phase,
                        unmet_subjects,
                    },
                )
            }
            ApiError::Curriculum(e) => {
                let status = match e {
                    CurriculumUpdateError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    CurriculumUpdateError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (
                    status,
                    ErrorBody {
                        error: e.to_string(),
                        phase: None,
                        unmet_subjects: Vec::new(),
                    },
                )
            }
            ApiError::Source(e) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    error: e.to_string(),
                    phase: None,
                    unmet_subjects: Vec::new(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

async fn set_availability_handler(
    State(service): State<AppState>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<TeacherAvailability>, ApiError> {
    let cell = Cell::parse(&request.day_of_week, request.slot_index)?;
    Ok(Json(service.set_availability(&request.teacher_id, cell).await?))
}

async fn get_availability_handler(
    State(service): State<AppState>,
    Path(teacher_id): Path<String>,
) -> Result<Json<Vec<TeacherAvailability>>, ApiError> {
    Ok(Json(service.get_availability(&teacher_id).await?))
}

async fn remove_availability_handler(
    State(service): State<AppState>,
    Path((teacher_id, day, slot)): Path<(String, String, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cell = Cell::parse(&day, slot)?;
    service.remove_availability(&teacher_id, cell).await?;
    Ok(Json(json!({ "message": "Availability removed" })))
}

async fn get_curriculum_handler(
    State(service): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<Vec<ClassSubject>>, ApiError> {
    Ok(Json(service.get_curriculum(&class_id).await?))
}

async fn set_curriculum_handler(
    State(service): State<AppState>,
    Path(class_id): Path<String>,
    Json(lines): Json<Vec<NewClassSubject>>,
) -> Result<Json<Vec<ClassSubject>>, ApiError> {
    Ok(Json(service.set_curriculum(&class_id, lines).await?))
}

async fn generate_handler(
    State(service): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<Vec<ScheduleSlot>>, ApiError> {
    Ok(Json(service.generate_schedule(&class_id).await?))
}

async fn view_handler(
    State(service): State<AppState>,
    Path(class_id): Path<String>,
) -> Result<Json<Vec<ScheduleSlot>>, ApiError> {
    Ok(Json(service.get_schedule(&class_id).await?))
}

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/schedule/availability", post(set_availability_handler))
        .route(
            "/schedule/availability/:teacher_id",
            get(get_availability_handler),
        )
        .route(
            "/schedule/availability/:teacher_id/:day/:slot",
            axum::routing::delete(remove_availability_handler),
        )
        .route(
            "/schedule/curriculum/:class_id",
            get(get_curriculum_handler).post(set_curriculum_handler),
        )
        .route("/schedule/generate/:class_id", post(generate_handler))
        .route("/schedule/view/:class_id", get(view_handler))
        .with_state(service)
}

pub async fn run_server(config: Config) -> std::io::Result<()> {
    let service = Arc::new(TimetableService::in_memory(&config));
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
