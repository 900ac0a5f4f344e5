use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

const UI_PATH: &str = "/docs";
const SPEC_PATH: &str = "/api-doc/openapi.json";

/// Serve the Swagger UI for the classroom activity API.
pub fn router(state: SharedState) -> Router<SharedState> {
    let ui: Router<SharedState> = SwaggerUi::new(UI_PATH)
        .url(SPEC_PATH, ApiDoc::openapi())
        .into();

    ui.with_state(state)
}
