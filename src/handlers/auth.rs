// src/handlers/auth.rs

use axum::Json;

use crate::{middleware::auth::AuthenticatedAdmin, models::auth::AdminIdentity};

// Handler da rota protegida /me
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Administrador autenticado", body = AdminIdentity),
        (status = 401, description = "Token inválido ou ausente")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedAdmin(admin): AuthenticatedAdmin) -> Json<AdminIdentity> {
    Json(admin)
}
