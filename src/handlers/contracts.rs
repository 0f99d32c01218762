// src/handlers/contracts.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedAdmin,
    models::contract::{ContractDetail, ContractPayload, ContractSummary},
};

#[utoipa::path(
    post,
    path = "/api/contracts",
    tag = "Contracts",
    request_body = ContractPayload,
    responses(
        (status = 201, description = "Contrato criado em rascunho", body = ContractDetail),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_contract(
    State(app_state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Json(payload): Json<ContractPayload>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.contract_service.create_contract(&admin, payload).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/api/contracts",
    tag = "Contracts",
    responses(
        (status = 200, description = "Contratos, do mais recente ao mais antigo", body = Vec<ContractSummary>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_contracts(
    State(app_state): State<AppState>,
    _admin: AuthenticatedAdmin,
) -> Result<Json<Vec<ContractSummary>>, AppError> {
    let summaries = app_state.contract_service.list_contracts().await?;
    Ok(Json(summaries))
}

#[utoipa::path(
    get,
    path = "/api/contracts/{contract_id}",
    tag = "Contracts",
    responses(
        (status = 200, description = "Contrato com suas opções", body = ContractDetail),
        (status = 404, description = "Contrato não encontrado")
    ),
    params(
        ("contract_id" = Uuid, Path, description = "ID do Contrato")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_contract(
    State(app_state): State<AppState>,
    _admin: AuthenticatedAdmin,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<ContractDetail>, AppError> {
    let detail = app_state.contract_service.get_contract_detail(contract_id).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    put,
    path = "/api/contracts/{contract_id}",
    tag = "Contracts",
    request_body = ContractPayload,
    responses(
        (status = 200, description = "Rascunho atualizado", body = ContractDetail),
        (status = 404, description = "Contrato não encontrado"),
        (status = 409, description = "Contrato já assinado ou alterado por outra operação")
    ),
    params(
        ("contract_id" = Uuid, Path, description = "ID do Contrato")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_contract(
    State(app_state): State<AppState>,
    _admin: AuthenticatedAdmin,
    Path(contract_id): Path<Uuid>,
    Json(payload): Json<ContractPayload>,
) -> Result<Json<ContractDetail>, AppError> {
    let detail = app_state.contract_service.update_contract(contract_id, payload).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    delete,
    path = "/api/contracts/{contract_id}",
    tag = "Contracts",
    responses(
        (status = 204, description = "Contrato e opções removidos"),
        (status = 404, description = "Contrato não encontrado"),
        (status = 500, description = "Exclusão parcial; o contrato foi mantido")
    ),
    params(
        ("contract_id" = Uuid, Path, description = "ID do Contrato")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_contract(
    State(app_state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    Path(contract_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let removed = app_state.contract_service.delete_contract(contract_id).await?;
    tracing::info!(contract_id = %contract_id, admin_id = %admin.id, options = removed, "contrato excluído");
    Ok(StatusCode::NO_CONTENT)
}
