use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the classroom activity backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::courses::create_activity,
        crate::routes::courses::list_activities,
        crate::routes::join::join_activity,
        crate::routes::activities::get_activity,
        crate::routes::activities::delete_activity,
        crate::routes::activities::start_activity,
        crate::routes::activities::stop_activity,
        crate::routes::activities::reset_activity,
        crate::routes::activities::submit_response,
        crate::routes::activities::activity_status,
        crate::routes::activities::activity_results,
        crate::routes::activities::export_responses,
        crate::routes::sse::activity_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::activity::CreateActivityRequest,
            crate::dto::activity::ActivityView,
            crate::dto::lifecycle::ActionResponse,
            crate::dto::lifecycle::StartResponse,
            crate::dto::lifecycle::SubmitRequest,
            crate::dto::lifecycle::ActivityStatus,
            crate::dto::lifecycle::StudentStatus,
            crate::dto::lifecycle::StaffStatus,
            crate::dto::results::ActivityResults,
            crate::dto::results::WordCount,
            crate::dto::results::GradedResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::UpdateType,
            crate::dto::ws::ActivityUpdateData,
            crate::dao::models::ActivityKind,
            crate::dao::models::QuizKind,
            crate::dao::models::LifecycleStateEntity,
        )
    ),
    modifiers(&BearerAuth),
    security(("bearer" = [])),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "activities", description = "Activity authoring and lookup"),
        (name = "lifecycle", description = "Start, stop, reset, submit and status"),
        (name = "results", description = "Aggregated results and CSV export"),
        (name = "realtime", description = "Activity rooms over WebSocket and SSE"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer token scheme used by every protected route.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
