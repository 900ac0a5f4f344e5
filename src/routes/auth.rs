use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{
    error::{AppError, ServiceError},
    state::SharedState,
};

const BEARER_PREFIX: &str = "Bearer ";
const TOKEN_QUERY_KEY: &str = "token";

/// Resolve the caller from `Authorization: Bearer <token>` (or `?token=` for
/// WebSocket and SSE upgrades) and attach the [`UserEntity`] as a request
/// extension.
///
/// [`UserEntity`]: crate::dao::directory::UserEntity
pub async fn require_user(
    State(state): State<SharedState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .or_else(|| query_token(&req))
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    let user = state
        .directory()
        .authenticate(token)
        .await
        .map_err(|err| AppError::from(ServiceError::from(err)))?
        .ok_or_else(|| {
            debug!("rejected unknown API token");
            AppError::Unauthorized("Invalid credentials".into())
        })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

fn bearer_token(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

fn query_token(req: &Request<Body>) -> Option<String> {
    req.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == TOKEN_QUERY_KEY && !value.is_empty()).then(|| value.to_owned())
        })
    })
}
