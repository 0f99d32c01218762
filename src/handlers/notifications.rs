// src/handlers/notifications.rs

use axum::{extract::State, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    services::notification_service::{ConfirmationEmailRequest, ConfirmationEmailResponse},
};

// Função chamável de confirmação. Só envia para o cliente de um contrato já assinado.
#[utoipa::path(
    post,
    path = "/api/notifications/confirmation",
    tag = "Notifications",
    request_body = ConfirmationEmailRequest,
    responses(
        (status = 200, description = "E-mail entregue ao relay", body = ConfirmationEmailResponse),
        (status = 400, description = "Campos obrigatórios ausentes ou ids inválidos"),
        (status = 403, description = "Contrato não assinado, opção ou destinatário não conferem"),
        (status = 404, description = "Contrato não encontrado"),
        (status = 502, description = "Relay de e-mail falhou")
    )
)]
pub async fn send_confirmation(
    State(app_state): State<AppState>,
    Json(payload): Json<ConfirmationEmailRequest>,
) -> Result<Json<ConfirmationEmailResponse>, AppError> {
    let resp = app_state.notification_service.send_signed_confirmation(&payload).await?;
    Ok(Json(resp))
}
