//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ClickPilot API",
        version = "0.1.0",
        description = "Thumbnail A/B testing for video channels.\n\nRuns experiments across candidate thumbnails, picks the highest-CTR winner and publishes it.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Operations", description = "Health, readiness, and liveness probes"),
        (name = "Auth", description = "Login, logout and the current user"),
        (name = "Videos", description = "Channel video catalog"),
        (name = "Experiments", description = "Thumbnail experiment lifecycle"),
        (name = "Dashboard", description = "Channel-wide totals and audit log"),
    ),
    paths(
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
        // Auth
        clickpilot_management::handlers::handle_login,
        clickpilot_management::handlers::handle_logout,
        clickpilot_management::handlers::current_user,
        // Videos
        clickpilot_management::handlers::list_videos,
        clickpilot_management::handlers::get_video,
        // Experiments
        clickpilot_management::handlers::list_experiments,
        clickpilot_management::handlers::get_experiment,
        clickpilot_management::handlers::create_experiment,
        clickpilot_management::handlers::record_metrics,
        clickpilot_management::handlers::tick_experiment,
        clickpilot_management::handlers::stop_experiment,
        // Dashboard
        clickpilot_management::handlers::dashboard,
        clickpilot_management::handlers::audit_log,
    ),
    components(schemas(
        crate::rest::HealthResponse,
        clickpilot_core::Video,
        clickpilot_core::ExperimentStatus,
        clickpilot_management::models::ExperimentView,
        clickpilot_management::models::VariantView,
        clickpilot_management::models::CreateExperimentRequest,
        clickpilot_management::models::RecordMetricsRequest,
        clickpilot_management::models::DashboardOverview,
        clickpilot_management::models::UserRecord,
        clickpilot_management::models::LoginRequest,
        clickpilot_management::models::LoginResponse,
        clickpilot_management::models::ErrorResponse,
        clickpilot_management::models::AuditLogEntry,
        clickpilot_management::models::AuditAction,
    ))
)]
pub struct ApiDoc;
