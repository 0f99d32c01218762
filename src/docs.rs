// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::get_me,

        // --- Contracts ---
        handlers::contracts::create_contract,
        handlers::contracts::list_contracts,
        handlers::contracts::get_contract,
        handlers::contracts::update_contract,
        handlers::contracts::delete_contract,

        // --- Public ---
        handlers::public::view_contract,
        handlers::public::sign_contract,

        // --- Notifications ---
        handlers::notifications::send_confirmation,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::AdminIdentity,

            // --- Contracts ---
            models::contract::ContractStatus,
            models::contract::SignatureKind,
            models::contract::Signature,
            models::contract::LineItem,
            models::contract::ContractOption,
            models::contract::Contract,
            models::contract::ContractDetail,
            models::contract::ContractSummary,
            models::contract::PublicContractView,
            models::contract::ContractPayload,
            models::contract::OptionPayload,

            // --- Public ---
            handlers::public::SignPayload,
            handlers::public::SignResponse,
            handlers::public::NotificationOutcome,

            // --- Notifications ---
            services::notification_service::ConfirmationEmailRequest,
            services::notification_service::ConfirmationEmailResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Identidade do administrador"),
        (name = "Contracts", description = "Criação, edição e exclusão de contratos"),
        (name = "Public", description = "Visualização e assinatura pelo cliente"),
        (name = "Notifications", description = "E-mail de confirmação de assinatura")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
