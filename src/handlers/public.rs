// src/handlers/public.rs

//! Rotas do cliente, acessadas pelo link público (sem autenticação).

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    models::contract::{Contract, ContractOption, PublicContractView, SignatureKind},
    services::signing::SigningSession,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    pub option_id: Uuid,
    #[schema(example = "Jane Doe")]
    pub signer_name: String,
    pub signature_kind: SignatureKind,
    /// Data URL da imagem desenhada. Ignorado no modo digitado.
    #[serde(default)]
    pub signature_data: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutcome {
    pub sent: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    pub contract: Contract,
    pub selected_option: ContractOption,
    pub notification: NotificationOutcome,
}

#[utoipa::path(
    get,
    path = "/api/public/contracts/{shareable_id}",
    tag = "Public",
    responses(
        (status = 200, description = "Contrato para o cliente", body = PublicContractView),
        (status = 404, description = "Link inválido")
    ),
    params(
        ("shareable_id" = String, Path, description = "Identificador público do contrato")
    )
)]
pub async fn view_contract(
    State(app_state): State<AppState>,
    Path(shareable_id): Path<String>,
) -> Result<Json<PublicContractView>, AppError> {
    let view = app_state.contract_service.public_view(&shareable_id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    post,
    path = "/api/public/contracts/{shareable_id}/sign",
    tag = "Public",
    request_body = SignPayload,
    responses(
        (status = 200, description = "Contrato assinado; o envio do e-mail é informado à parte", body = SignResponse),
        (status = 400, description = "Assinatura incompleta"),
        (status = 404, description = "Contrato ou opção não encontrados"),
        (status = 409, description = "Contrato já assinado")
    ),
    params(
        ("shareable_id" = String, Path, description = "Identificador público do contrato")
    )
)]
pub async fn sign_contract(
    State(app_state): State<AppState>,
    Path(shareable_id): Path<String>,
    Json(payload): Json<SignPayload>,
) -> Result<Json<SignResponse>, AppError> {
    let contract = app_state.contract_service.find_by_shareable_id(&shareable_id).await?;

    let mut session = SigningSession::new();
    session.select_option_id(payload.option_id);
    session.set_signer_name(payload.signer_name);
    session.set_mode(payload.signature_kind);
    if let Some(data) = payload.signature_data {
        session.set_drawn_image(data);
    }

    let (contract, option) = session.commit(&app_state.contract_service, contract.id).await?;

    // O e-mail não desfaz a assinatura: a falha só é reportada.
    let notifications = &app_state.notification_service;
    let outcome = match notifications.confirmation_request(&contract, &option) {
        Ok(req) => notifications.send_signed_confirmation(&req).await.map(|_| ()),
        Err(e) => Err(e),
    };
    let notification = match outcome {
        Ok(()) => NotificationOutcome { sent: true, error: None },
        Err(e) => {
            tracing::error!(contract_id = %contract.id, error = %e, "assinatura gravada, mas o e-mail falhou");
            NotificationOutcome { sent: false, error: Some(e.to_string()) }
        }
    };

    Ok(Json(SignResponse { contract, selected_option: option, notification }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Settings,
        db::InMemoryContractStore,
        models::contract::ContractStatus,
        services::{
            contract_service::tests::{admin, payload, priced_option},
            notification_service::MockEmailRelay,
        },
    };
    use axum::{http::StatusCode, response::IntoResponse};
    use serde_json::json;
    use std::{sync::Arc, time::Duration};

    fn settings() -> Settings {
        Settings {
            database_url: None,
            jwt_secret: "segredo".into(),
            bind_addr: "127.0.0.1:0".into(),
            store_timeout: Duration::from_secs(2),
            email_relay_url: None,
            admin_recipient: "ops@example.com".into(),
            view_base_url: "https://contracts.example.com/view.html".into(),
            company_name: "Community Fiber Network".into(),
        }
    }

    async fn draft_state(relay: MockEmailRelay) -> (AppState, String, Uuid, Uuid) {
        let state = AppState::assemble(
            settings(),
            None,
            Arc::new(InMemoryContractStore::new()),
            Arc::new(relay),
        );
        let created = state
            .contract_service
            .create_contract(
                &admin(),
                payload(vec![priced_option("Fiber", json!([{ "type": "item", "qty": 2, "mrc": 10 }]))]),
            )
            .await
            .unwrap();
        let sid = created.contract.shareable_id.clone();
        (state, sid, created.contract.id, created.options[0].id)
    }

    fn sign_payload(body: serde_json::Value) -> Json<SignPayload> {
        Json(serde_json::from_value(body).unwrap())
    }

    #[tokio::test]
    async fn relay_failure_is_reported_after_the_signature_is_stored() {
        let mut relay = MockEmailRelay::new();
        relay
            .expect_send()
            .times(1)
            .returning(|_| Err(AppError::NotificationFailed("relay fora do ar".into())));
        let (state, sid, contract_id, option_id) = draft_state(relay).await;

        let Json(resp) = sign_contract(
            State(state.clone()),
            Path(sid),
            sign_payload(json!({
                "optionId": option_id,
                "signerName": "Jane Doe",
                "signatureKind": "typed"
            })),
        )
        .await
        .unwrap();

        assert!(!resp.notification.sent);
        assert!(resp.notification.error.as_deref().is_some_and(|e| e.contains("relay fora do ar")));
        assert_eq!(resp.contract.status, ContractStatus::Signed);
        assert_eq!(resp.selected_option.id, option_id);
        assert_eq!(Json(resp).into_response().status(), StatusCode::OK);

        let stored = state.contract_service.get_contract(contract_id).await.unwrap();
        assert_eq!(stored.status, ContractStatus::Signed);
        assert_eq!(stored.selected_option_id, Some(option_id));
        assert_eq!(stored.signature.unwrap().data, "Jane Doe");
    }

    #[tokio::test]
    async fn successful_relay_marks_notification_sent() {
        let mut relay = MockEmailRelay::new();
        relay.expect_send().times(1).returning(|_| Ok(()));
        let (state, sid, _, option_id) = draft_state(relay).await;

        let Json(resp) = sign_contract(
            State(state),
            Path(sid),
            sign_payload(json!({
                "optionId": option_id,
                "signerName": "Jane Doe",
                "signatureKind": "drawn",
                "signatureData": "data:image/png;base64,AAAA"
            })),
        )
        .await
        .unwrap();

        assert!(resp.notification.sent);
        assert!(resp.notification.error.is_none());
    }

    #[tokio::test]
    async fn drawn_signature_without_image_data_is_rejected_and_contract_stays_draft() {
        let mut relay = MockEmailRelay::new();
        relay.expect_send().times(0);
        let (state, sid, contract_id, option_id) = draft_state(relay).await;

        let err = sign_contract(
            State(state.clone()),
            Path(sid),
            sign_payload(json!({
                "optionId": option_id,
                "signerName": "Jane Doe",
                "signatureKind": "drawn",
                "signatureData": "nao-e-uma-imagem"
            })),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let stored = state.contract_service.get_contract(contract_id).await.unwrap();
        assert_eq!(stored.status, ContractStatus::Draft);
        assert!(stored.signature.is_none());
    }

    #[tokio::test]
    async fn unknown_share_link_is_not_found() {
        let mut relay = MockEmailRelay::new();
        relay.expect_send().times(0);
        let (state, _, _, _) = draft_state(relay).await;

        let err = view_contract(State(state), Path("ffffffff".into())).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
