//! # API REST
//!
//! REST API implementation for FemCare.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! All behaviour lives in `femcare-core`; handlers only translate.

#![warn(rust_2018_idioms)]

pub mod dto;
pub mod error;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use femcare_core::{
    CoreServices, DashboardError, ProfileError, RegistrationForm, SessionHandle,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::dto::{
    AppointmentRes, DashboardRes, ErrorRes, HealthRes, LoginReq, LoginRes, PasswordResetReq,
    RegisterReq, RepairRes, SessionRes, SuccessRes, UserRes,
};
pub use crate::error::ApiError;

/// Application state for the REST API server
///
/// Holds the core services plus a read-only handle on the session state owned by the
/// session observer.
#[derive(Clone)]
pub struct AppState {
    services: CoreServices,
    session: SessionHandle,
}

impl AppState {
    pub fn new(services: CoreServices) -> Self {
        let session = services.session.handle();
        Self { services, session }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, register, login, logout, password_reset, session, dashboard, repair),
    components(schemas(
        HealthRes,
        SuccessRes,
        ErrorRes,
        LoginReq,
        LoginRes,
        RegisterReq,
        PasswordResetReq,
        UserRes,
        SessionRes,
        DashboardRes,
        AppointmentRes,
        RepairRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset", post(password_reset))
        .route("/session", get(session))
        .route("/dashboard", get(dashboard))
        .route("/admin/repair", post(repair))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "FemCare REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "Account and profile records created", body = UserRes),
        (status = 400, description = "Invalid email or weak password", body = ErrorRes),
        (status = 409, description = "Email already registered", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Register a patient account.
///
/// Creates the identity, signs it in and writes the `users` and `patients` records.
#[axum::debug_handler]
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> Result<(StatusCode, Json<UserRes>), ApiError> {
    let form = RegistrationForm::from(req);
    let user = state.services.accounts.register(&form).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Signed in; profile reconciled", body = LoginRes),
        (status = 400, description = "Invalid email address", body = ErrorRes),
        (status = 401, description = "Unknown account or wrong password", body = ErrorRes),
        (status = 403, description = "Account disabled", body = ErrorRes),
        (status = 429, description = "Too many failed attempts", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Sign in and return the reconciled user with the dashboard to open.
#[axum::debug_handler]
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<Json<LoginRes>, ApiError> {
    let outcome = state
        .services
        .accounts
        .login(&req.email, &req.password)
        .await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = SuccessRes)
    )
)]
#[axum::debug_handler]
async fn logout(State(state): State<AppState>) -> Result<Json<SuccessRes>, ApiError> {
    state
        .services
        .accounts
        .sign_out()
        .await
        .map_err(|e| ApiError::Account(femcare_core::AccountError::SignIn(e)))?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    post,
    path = "/auth/password-reset",
    request_body = PasswordResetReq,
    responses(
        (status = 200, description = "Reset requested", body = SuccessRes),
        (status = 400, description = "Invalid email address", body = ErrorRes),
        (status = 404, description = "No account for this email", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetReq>,
) -> Result<Json<SuccessRes>, ApiError> {
    state
        .services
        .accounts
        .request_password_reset(&req.email)
        .await?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session state", body = SessionRes)
    )
)]
/// Current session state as maintained by the session observer.
#[axum::debug_handler]
async fn session(State(state): State<AppState>) -> Json<SessionRes> {
    Json(state.session.snapshot().into())
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Patient dashboard data", body = DashboardRes),
        (status = 401, description = "Not authenticated or record not owned by caller", body = ErrorRes),
        (status = 404, description = "No patient data found", body = ErrorRes),
        (status = 500, description = "Error fetching patient data", body = ErrorRes)
    )
)]
/// Patient dashboard for the signed-in identity.
///
/// Uses the session's reconciled user when it matches the current identity, otherwise
/// reconciles first.
#[axum::debug_handler]
async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardRes>, ApiError> {
    let identity = state
        .services
        .identity
        .current()
        .ok_or(ApiError::Unauthenticated)?;

    let user = match state.session.snapshot().user {
        Some(user) if user.uid == identity.uid => user,
        _ => state
            .services
            .reconciler
            .reconcile(&identity)
            .await
            .map_err(|e| match e {
                ProfileError::Store(e) => DashboardError::Fetch(e),
            })?,
    };

    let record = state.services.dashboard.load(&user).await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/admin/repair",
    responses(
        (status = 200, description = "Repair pass report", body = RepairRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Create missing patient records for patient-role users.
#[axum::debug_handler]
async fn repair(State(state): State<AppState>) -> Result<Json<RepairRes>, ApiError> {
    let report = state
        .services
        .repair
        .repair_orphans()
        .await
        .map_err(ApiError::Repair)?;
    Ok(Json(report.into()))
}
