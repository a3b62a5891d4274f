/// Task endpoints
///
/// # Endpoints
///
/// - `GET /api/tasks` - All tasks, newest first
/// - `GET /api/tasks/:id` - One task with its applicants
/// - `POST /api/tasks` - Post a task (Client; multipart or JSON)
/// - `POST /api/tasks/:id/apply` - Apply to a task (Freelancer)
/// - `DELETE /api/tasks/:id` - Delete an owned task (Client)
/// - `POST /api/tasks/:id/applicants/:freelancer_id/accept` - Accept an applicant
/// - `POST /api/tasks/:id/applicants/:freelancer_id/reject` - Reject an applicant
/// - `GET /api/tasks/client-applicants` - Applicants across the caller's tasks
/// - `POST /api/tasks/update-applicant-status` - Accept or reject by status name

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, OptionalJson},
    uploads,
};
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    Extension, Json,
};
use dtask_shared::{
    auth::context::AuthContext,
    models::{
        applicant::{Applicant, ApplicantView},
        task::Task,
        user::Role,
    },
    services::marketplace::{ApplicationInput, Listing, ListingInput},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Multipart field carrying the uploaded file
const ATTACHMENT_FIELD: &str = "attachments";

/// An uploaded file, held in memory until the form validates
#[derive(Debug)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Task form from either `multipart/form-data` or a JSON body
#[derive(Debug)]
pub struct TaskForm {
    pub fields: ListingInput,
    pub attachment: Option<Upload>,
}

/// JSON budget: browsers send a string, scripts often a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// JSON skills: a comma-separated string or a list of tags
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkillsInput {
    List(Vec<String>),
    Csv(String),
}

#[derive(Debug, Default, Deserialize)]
struct TaskJson {
    title: Option<String>,
    description: Option<String>,
    budget: Option<NumberOrText>,
    deadline: Option<String>,
    skills: Option<SkillsInput>,
}

impl From<TaskJson> for ListingInput {
    fn from(body: TaskJson) -> Self {
        Self {
            title: body.title,
            description: body.description,
            budget: body.budget.map(|budget| match budget {
                NumberOrText::Number(n) => n.to_string(),
                NumberOrText::Text(s) => s,
            }),
            deadline: body.deadline,
            skills: body.skills.map(|skills| match skills {
                SkillsInput::List(tags) => tags.join(","),
                SkillsInput::Csv(csv) => csv,
            }),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for TaskForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(body) = Json::<TaskJson>::from_request(req, state).await?;

            return Ok(Self {
                fields: body.into(),
                attachment: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let mut fields = ListingInput::default();
        let mut attachment = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if name == ATTACHMENT_FIELD {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;

                // Browsers send an empty part when no file was chosen
                if !file_name.is_empty() || !bytes.is_empty() {
                    attachment = Some(Upload { file_name, bytes });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;

            match name.as_str() {
                "title" => fields.title = Some(value),
                "description" => fields.description = Some(value),
                "budget" => fields.budget = Some(value),
                "deadline" => fields.deadline = Some(value),
                "skills" => fields.skills = Some(value),
                _ => {}
            }
        }

        Ok(Self { fields, attachment })
    }
}

/// Apply request; both fields are optional
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// Account ID or wallet of the caller
    pub freelancer_id: Option<String>,

    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,
}

/// Status-change request for the review dashboard
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    #[validate(required(message = "taskId, freelancerId and status are required"))]
    pub task_id: Option<String>,

    #[validate(required(message = "taskId, freelancerId and status are required"))]
    pub freelancer_id: Option<String>,

    #[validate(required(message = "taskId, freelancerId and status are required"))]
    pub status: Option<String>,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response to a successful application
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub message: String,
    pub applicant: Applicant,
}

/// Task IDs are UUIDs; anything else cannot name a task
fn parse_task_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::NotFound("Task not found".to_string()))
}

/// Post a task
///
/// Accepts `multipart/form-data` with fields `title`, `description`,
/// `budget`, `deadline`, `skills` (comma-separated) and an optional file
/// under `attachments`, or the same fields as JSON.
///
/// The form is validated before the attachment is written, so a rejected
/// post leaves no file behind.
///
/// # Errors
///
/// - `400 Bad Request`: missing title, budget or deadline; bad budget
/// - `401 Unauthorized`: missing or invalid token
/// - `403 Forbidden`: caller is not a Client
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    form: TaskForm,
) -> ApiResult<(StatusCode, Json<Task>)> {
    auth.require_role(Role::Client)?;

    let listing = Listing::parse(form.fields)?;

    let attachment = match form.attachment {
        Some(upload) => Some(
            uploads::store_attachment(&state.config.uploads.dir, &upload.file_name, &upload.bytes)
                .await
                .map_err(|e| ApiError::InternalError(format!("Failed to store attachment: {}", e)))?,
        ),
        None => None,
    };

    let task = state.marketplace.post_task(&auth, listing, attachment).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.marketplace.list_tasks().await?))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Task>> {
    let task_id = parse_task_id(&task_id)?;
    Ok(Json(state.marketplace.get_task(task_id).await?))
}

/// Apply to a task
///
/// ```text
/// POST /api/tasks/:id/apply
/// Authorization: Bearer <token>
///
/// { "freelancerId": "<id or wallet>", "name": "Ada" }
/// ```
///
/// The body may be omitted. `name` defaults to the caller's full name. A
/// body that is present must be well-formed.
///
/// # Errors
///
/// - `400 Bad Request`: malformed body, or already applied
/// - `403 Forbidden`: caller is not a Freelancer, or `freelancerId` names
///   someone else
/// - `404 Not Found`: no such task
pub async fn apply_to_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<String>,
    OptionalJson(body): OptionalJson<ApplyRequest>,
) -> ApiResult<Json<ApplyResponse>> {
    let task_id = parse_task_id(&task_id)?;
    let req = body.unwrap_or_default();
    req.validate()?;

    let applicant = state
        .marketplace
        .apply_to_task(
            task_id,
            &auth,
            ApplicationInput {
                freelancer_id: req.freelancer_id,
                name: req.name,
            },
        )
        .await?;

    Ok(Json(ApplyResponse {
        message: "Application submitted successfully".to_string(),
        applicant,
    }))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let task_id = parse_task_id(&task_id)?;
    state.marketplace.delete_task(task_id, &auth).await?;

    Ok(Json(MessageResponse {
        message: "Task deleted successfully".to_string(),
    }))
}

/// Accept an applicant
///
/// Repeating an acceptance returns the applicant unchanged. Accepting a
/// rejected applicant is refused.
pub async fn accept_applicant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((task_id, freelancer)): Path<(String, String)>,
) -> ApiResult<Json<Applicant>> {
    let task_id = parse_task_id(&task_id)?;
    Ok(Json(
        state
            .marketplace
            .accept_applicant(task_id, &freelancer, &auth)
            .await?,
    ))
}

pub async fn reject_applicant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((task_id, freelancer)): Path<(String, String)>,
) -> ApiResult<Json<Applicant>> {
    let task_id = parse_task_id(&task_id)?;
    Ok(Json(
        state
            .marketplace
            .reject_applicant(task_id, &freelancer, &auth)
            .await?,
    ))
}

pub async fn client_applicants(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ApplicantView>>> {
    Ok(Json(state.marketplace.client_applicants(&auth).await?))
}

/// Accept or reject by status name
///
/// ```text
/// POST /api/tasks/update-applicant-status
///
/// { "taskId": "...", "freelancerId": "...", "status": "Accepted" }
/// ```
pub async fn update_applicant_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> ApiResult<Json<Applicant>> {
    req.validate()?;

    let task_id = parse_task_id(req.task_id.as_deref().unwrap_or_default())?;
    let freelancer = req.freelancer_id.unwrap_or_default();
    let status = req.status.unwrap_or_default();

    Ok(Json(
        state
            .marketplace
            .update_applicant_status(task_id, &freelancer, &status, &auth)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    async fn extract(req: Request<Body>) -> Result<TaskForm, ApiError> {
        TaskForm::from_request(req, &()).await
    }

    #[tokio::test]
    async fn test_task_form_from_json() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"title":"Logo","budget":250,"deadline":"2026-12-01","skills":["design","svg"]}"#,
            ))
            .unwrap();

        let form = extract(req).await.unwrap();
        assert_eq!(form.fields.title.as_deref(), Some("Logo"));
        assert_eq!(form.fields.budget.as_deref(), Some("250"));
        assert_eq!(form.fields.skills.as_deref(), Some("design,svg"));
        assert!(form.attachment.is_none());
    }

    #[tokio::test]
    async fn test_task_form_from_multipart() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nLogo\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"budget\"\r\n\r\n99.5\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"skills\"\r\n\r\nsvg, figma\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"attachments\"; filename=\"brief.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nhello\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let form = extract(req).await.unwrap();
        assert_eq!(form.fields.title.as_deref(), Some("Logo"));
        assert_eq!(form.fields.budget.as_deref(), Some("99.5"));
        assert_eq!(form.fields.skills.as_deref(), Some("svg, figma"));
        assert!(form.fields.deadline.is_none());

        let upload = form.attachment.unwrap();
        assert_eq!(upload.file_name, "brief.txt");
        assert_eq!(&upload.bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_task_form_skips_empty_file_part() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"attachments\"; filename=\"\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("POST")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        assert!(extract(req).await.unwrap().attachment.is_none());
    }

    #[tokio::test]
    async fn test_task_form_rejects_malformed_json() {
        let req = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        assert!(matches!(extract(req).await, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_parse_task_id() {
        assert!(parse_task_id(&Uuid::new_v4().to_string()).is_ok());
        assert!(matches!(parse_task_id("abc"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_update_status_request_requires_fields() {
        let req: UpdateStatusRequest =
            serde_json::from_value(serde_json::json!({ "taskId": "x" })).unwrap();
        assert!(req.validate().is_err());
    }
}
