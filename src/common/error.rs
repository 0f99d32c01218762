use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::contract::ContractStatus;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// As variantes seguem a taxonomia: validação, pré-condição, armazenamento, não encontrado.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Dados inválidos: {0}")]
    InvalidInput(String),

    // --- Pré-condições ---
    #[error("Contrato está '{}' e não pode mais ser alterado", .0.as_str())]
    NotEditable(ContractStatus),

    #[error("Contrato {0} foi alterado por outra operação")]
    VersionConflict(Uuid),

    #[error("Identificador público já está em uso: {0}")]
    DuplicateShareableId(String),

    // --- Não encontrado ---
    #[error("Contrato não encontrado: {0}")]
    ContractNotFound(String),

    #[error("Opção não encontrada: {0}")]
    OptionNotFound(Uuid),

    // --- Autenticação ---
    #[error("Token inválido")]
    InvalidToken,

    // --- Armazenamento ---
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Tempo esgotado na operação de armazenamento '{0}'")]
    StoreTimeout(&'static str),

    #[error("Exclusão parcial do contrato {contract_id}: {failed} opção(ões) não foram removidas")]
    PartialDelete { contract_id: Uuid, failed: usize },

    #[error("Documento malformado: {0}")]
    MalformedDocument(String),

    #[error("Operação não permitida: {0}")]
    Forbidden(String),

    // --- Notificação ---
    #[error("Falha ao enviar e-mail de confirmação: {0}")]
    NotificationFailed(String),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::NotificationFailed(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InvalidInput(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ref e @ (AppError::NotEditable(_)
            | AppError::VersionConflict(_)
            | AppError::DuplicateShareableId(_)) => (StatusCode::CONFLICT, e.to_string()),
            ref e @ (AppError::ContractNotFound(_) | AppError::OptionNotFound(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.".to_string(),
            ),
            AppError::Forbidden(ref msg) => {
                tracing::warn!(reason = %msg, "requisição recusada");
                (StatusCode::FORBIDDEN, msg.clone())
            }
            ref e @ AppError::StoreTimeout(_) => {
                tracing::error!(error = %e, "timeout no armazenamento");
                (StatusCode::GATEWAY_TIMEOUT, e.to_string())
            }
            ref e @ AppError::NotificationFailed(_) => {
                tracing::error!(error = %e, "falha no relay de e-mail");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            // A exclusão parcial pode ser repetida por inteiro, então o cliente precisa da mensagem.
            ref e @ AppError::PartialDelete { .. } => {
                tracing::error!(error = %e, "exclusão em cascata incompleta");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }

            // Todos os outros erros (DatabaseError, InternalServerError...) viram 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
