// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{common::error::AppError, config::AppState, models::auth::AdminIdentity};

// Protege as rotas administrativas: valida o Bearer e injeta a identidade.
pub async fn admin_guard(
    State(app_state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::InvalidToken)?;

    let admin = app_state.auth_service.validate_token(bearer.token())?;
    tracing::debug!(admin_id = %admin.id, "administrador autenticado");

    request.extensions_mut().insert(admin);
    Ok(next.run(request).await)
}

// Extrator para obter o administrador autenticado diretamente nos handlers
pub struct AuthenticatedAdmin(pub AdminIdentity);

impl<S> FromRequestParts<S> for AuthenticatedAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminIdentity>()
            .cloned()
            .map(AuthenticatedAdmin)
            .ok_or(AppError::InvalidToken)
    }
}
