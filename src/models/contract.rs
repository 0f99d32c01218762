// src/models/contract.rs

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Texto fixo anexado ao cronograma de instalação.
pub const INSTALLATION_DISCLAIMER: &str = "Special installations, ad hoc requests, or delays caused by the Customer's vendor may extend timelines and potentially incur additional costs.";

/// Prazo usado quando a opção não informa um prazo válido.
pub const DEFAULT_TERM_MONTHS: u32 = 36;

// --- Enums ---

/// Ciclo de vida do contrato. `Signed` e `Locked` são ambos imutáveis;
/// `Locked` é reservado para uso administrativo e nunca é produzido pelo fluxo de assinatura.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Signed,
    Locked,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Signed => "signed",
            ContractStatus::Locked => "locked",
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, ContractStatus::Draft)
    }

    // O status só anda para frente: draft -> signed -> locked.
    pub fn can_transition_to(&self, next: ContractStatus) -> bool {
        matches!(
            (self, next),
            (ContractStatus::Draft, ContractStatus::Signed)
                | (ContractStatus::Signed, ContractStatus::Locked)
        )
    }
}

impl FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContractStatus::Draft),
            "signed" => Ok(ContractStatus::Signed),
            "locked" => Ok(ContractStatus::Locked),
            other => Err(format!("status desconhecido: '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SignatureKind {
    Drawn,
    Typed,
}

// --- Documentos ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[schema(example = "Jane Doe")]
    pub signer_name: String,
    pub signed_at: DateTime<Utc>,
    pub kind: SignatureKind,
    /// Imagem (data URL) do traço desenhado ou o nome digitado.
    pub data: String,
}

impl Signature {
    pub fn validate_payload(&self) -> Result<(), String> {
        if self.signer_name.trim().is_empty() {
            return Err("O nome do signatário é obrigatório.".into());
        }
        let data = self.data.trim();
        match self.kind {
            SignatureKind::Drawn if !data.starts_with("data:image/") || data.len() <= "data:image/".len() => {
                Err("A assinatura desenhada deve ser uma imagem codificada.".into())
            }
            SignatureKind::Typed if data.is_empty() => {
                Err("A assinatura digitada não pode ser vazia.".into())
            }
            _ => Ok(()),
        }
    }
}

/// Linha da tabela de preços: um cabeçalho de seção ou um item precificado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LineItem {
    Header {
        value: String,
    },
    Item {
        description: String,
        qty: u32,
        mrc: Decimal,
        nrc: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractOption {
    pub id: Uuid,
    pub contract_id: Uuid,
    #[schema(example = "Fiber 1G")]
    pub title: String,
    #[schema(example = 36)]
    pub term_months: u32,
    #[serde(rename = "totalMRC")]
    #[schema(example = "23.00")]
    pub total_mrc: Decimal,
    #[serde(rename = "totalNRC")]
    #[schema(example = "10.00")]
    pub total_nrc: Decimal,
    pub line_items: Vec<LineItem>,
    pub position: i32,
}

impl ContractOption {
    pub fn label(&self) -> String {
        format!("{} ({} Month Term)", self.title, self.term_months)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    #[schema(example = "3f9a1c2e")]
    pub shareable_id: String,
    #[schema(example = "Acme Dental")]
    pub business_name: String,
    pub agent_business_name: Option<String>,
    pub customer_email: String,
    pub service_address: String,
    pub is_billing_same_as_service: bool,
    pub billing_address: String,
    pub multi_site_addresses: Vec<String>,
    pub installation_schedule_text: String,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub admin_id: String,
    pub selected_option_id: Option<Uuid>,
    pub signature: Option<Signature>,
    /// Incrementado a cada escrita; usado como pré-condição de concorrência.
    pub version: i64,
}

// --- Respostas compostas ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    #[serde(flatten)]
    pub contract: Contract,
    pub options: Vec<ContractOption>,
}

/// Linha da listagem administrativa.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractSummary {
    #[serde(flatten)]
    pub contract: Contract,
    #[schema(example = "Fiber 1G")]
    pub option_label: String,
    pub option_term_months: Option<u32>,
    pub signed_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
}

/// O que o cliente vê pelo link público.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicContractView {
    pub contract: Contract,
    pub locked: bool,
    /// Vazio quando o contrato já foi assinado.
    pub options: Vec<ContractOption>,
    pub selected_option: Option<ContractOption>,
}

// --- Payloads de entrada ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractPayload {
    #[validate(length(min = 1, message = "O nome da empresa é obrigatório."))]
    #[schema(example = "Acme Dental")]
    pub business_name: String,

    #[serde(default)]
    pub agent_business_name: Option<String>,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    #[schema(example = "owner@acme.example")]
    pub customer_email: String,

    #[validate(length(min = 1, message = "O endereço de serviço é obrigatório."))]
    pub service_address: String,

    #[serde(default)]
    pub is_billing_same_as_service: bool,

    #[serde(default)]
    pub billing_address: String,

    #[serde(default)]
    pub multi_site_addresses: Vec<String>,

    #[serde(default)]
    pub installation_schedule: String,

    #[serde(default)]
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OptionPayload {
    #[serde(default)]
    pub title: String,

    // Aceita número ou texto, como vem do formulário.
    #[serde(default)]
    #[schema(value_type = Object, example = 36)]
    pub term_months: Value,

    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub line_items: Vec<LineItemPayload>,
}

/// Linha crua, antes da normalização do motor de preços.
/// Também é o formato lido do banco, para revalidar na leitura.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LineItemPayload {
    Header {
        #[serde(default)]
        value: String,
    },
    Item {
        #[serde(default)]
        description: String,
        #[serde(default)]
        qty: Value,
        #[serde(default)]
        mrc: Value,
        #[serde(default)]
        nrc: Value,
    },
    #[serde(other)]
    Unknown,
}
