/// Account endpoints
///
/// # Endpoints
///
/// - `POST /api/users/register` - Create an account and get a token
/// - `POST /api/users/login` - Sign in and get a token
/// - `POST /api/users/users/login` - Same as above, for older clients
/// - `GET /api/users/profile` - Caller's profile
/// - `GET /api/users/me` - Caller's profile for the role in the token

use crate::{app::AppState, error::ApiResult, extract::ApiJson};
use axum::{extract::State, http::StatusCode, Extension, Json};
use dtask_shared::{
    auth::context::AuthContext,
    models::user::{UserProfile, UserSummary},
    services::accounts::{AuthSession, Registration},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Register request
///
/// Every field is optional at the wire level so that missing fields produce
/// the account service's own message instead of a deserialization error.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(max = 255, message = "Full name must be at most 255 characters"))]
    pub full_name: Option<String>,

    #[validate(length(max = 320, message = "Email must be at most 320 characters"))]
    pub email: Option<String>,

    #[validate(length(max = 64, message = "Phone must be at most 64 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 255, message = "Location must be at most 255 characters"))]
    pub location: Option<String>,

    pub password: Option<String>,

    pub confirm_password: Option<String>,

    pub role: Option<String>,

    /// Wallet address; `walletAddress` is accepted too
    #[serde(alias = "walletAddress")]
    #[validate(length(max = 128, message = "Wallet must be at most 128 characters"))]
    pub wallet: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            full_name: req.full_name.unwrap_or_default(),
            email: req.email.unwrap_or_default(),
            phone: req.phone.unwrap_or_default(),
            location: req.location,
            password: req.password.unwrap_or_default(),
            confirm_password: req.confirm_password.unwrap_or_default(),
            role: req.role.unwrap_or_default(),
            wallet_address: req.wallet.unwrap_or_default(),
        }
    }
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(max = 320, message = "Email must be at most 320 characters"))]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

/// Register and login response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub message: String,
    pub user: UserSummary,
    pub token: String,
}

impl SessionResponse {
    fn new(message: &str, session: AuthSession) -> Self {
        Self {
            message: message.to_string(),
            user: session.user,
            token: session.token,
        }
    }
}

/// Register a new account
///
/// ```text
/// POST /api/users/register
/// Content-Type: application/json
///
/// {
///   "fullName": "Ada Lovelace",
///   "email": "ada@example.com",
///   "phone": "555-0100",
///   "password": "...",
///   "confirmPassword": "...",
///   "role": "Client",
///   "wallet": "0xabc"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: missing fields, password mismatch, unknown role,
///   email or wallet already registered
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    req.validate()?;

    let session = state.accounts.register(req.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new("User registered successfully", session)),
    ))
}

/// Sign in
///
/// # Errors
///
/// - `404 Not Found`: no account with that email
/// - `401 Unauthorized`: wrong password
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let session = state.accounts.authenticate(&req.email, &req.password).await?;

    Ok(Json(SessionResponse::new("Login successful", session)))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.accounts.get_by_id(auth.user_id).await?))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(
        state
            .accounts
            .get_by_id_and_role(auth.user_id, auth.role)
            .await?,
    ))
}
