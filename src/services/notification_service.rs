// src/services/notification_service.rs

use std::{fmt::Write as _, sync::Arc};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::contract::{Contract, ContractOption, LineItem},
    services::contract_service::ContractService,
};

// =========================================================================
//  RELAY DE E-MAIL
// =========================================================================

/// Corpo aceito pelo relay externo.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    /// Destinatários separados por vírgula.
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailRelay: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError>;
}

/// Envia via POST para o relay HTTP configurado em `EMAIL_RELAY_URL`.
pub struct HttpEmailRelay {
    client: reqwest::Client,
    url: String,
}

impl HttpEmailRelay {
    pub fn new(url: String, timeout: std::time::Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl EmailRelay for HttpEmailRelay {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        let body = serde_json::to_string(message)
            .map_err(|e| AppError::NotificationFailed(e.to_string()))?;

        tracing::info!(to = %message.to, "enviando e-mail via relay");
        // O relay espera text/plain com JSON no corpo.
        let resp = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::NotificationFailed(format!("relay respondeu {}: {}", status.as_u16(), body)));
        }
        Ok(())
    }
}

/// Usado quando nenhum relay foi configurado: toda tentativa é reportada como falha.
pub struct DisabledEmailRelay;

#[async_trait]
impl EmailRelay for DisabledEmailRelay {
    async fn send(&self, _message: &EmailMessage) -> Result<(), AppError> {
        Err(AppError::NotificationFailed("nenhum relay de e-mail configurado".into()))
    }
}

// =========================================================================
//  CONTRATO DA FUNÇÃO DE CONFIRMAÇÃO
// =========================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationEmailRequest {
    #[serde(default)]
    pub to_email: String,
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub signer_name: String,
    #[serde(default)]
    pub signed_date: String,
    #[serde(default)]
    pub option_title: String,
    #[serde(default)]
    pub option_term: u32,
    #[serde(rename = "optionMRC", default)]
    pub option_mrc: String,
    #[serde(rename = "optionNRC", default)]
    pub option_nrc: String,
    #[serde(default)]
    pub contract_link: String,
    #[serde(default)]
    pub selected_option_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ConfirmationEmailResponse {
    pub success: bool,
}

// =========================================================================
//  FORMATAÇÃO
// =========================================================================

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

/// Destinatários informados + administrador fixo, sem repetição e sem vazios.
pub fn recipients(to: &[String], admin_recipient: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for address in to.iter().map(String::as_str).chain(std::iter::once(admin_recipient)) {
        let address = address.trim();
        if !address.is_empty() && !out.iter().any(|a| a.eq_ignore_ascii_case(address)) {
            out.push(address.to_string());
        }
    }
    out
}

/// Tabela das linhas; cabeçalhos de seção ficam destacados.
pub fn line_items_table(items: &[LineItem]) -> String {
    if items.is_empty() {
        return "<p>No line items available.</p>".to_string();
    }

    let mut rows = String::new();
    for item in items {
        match item {
            LineItem::Header { value } => {
                let _ = write!(
                    rows,
                    r#"<tr><td colspan="4" style="background-color: #f3f4f6; font-weight: bold; padding: 5px; border-top: 1px solid #ddd;">{}</td></tr>"#,
                    escape_html(value)
                );
            }
            LineItem::Item { description, qty, mrc, nrc } => {
                let _ = write!(
                    rows,
                    r#"<tr><td style="padding: 5px; border-bottom: 1px solid #eee;">{}</td><td style="padding: 5px; border-bottom: 1px solid #eee; text-align: center;">{}</td><td style="padding: 5px; border-bottom: 1px solid #eee; text-align: right;">${}</td><td style="padding: 5px; border-bottom: 1px solid #eee; text-align: right;">${}</td></tr>"#,
                    escape_html(description),
                    qty,
                    money(*mrc),
                    money(*nrc)
                );
            }
        }
    }

    format!(
        r#"<table style="width: 100%; border-collapse: collapse; font-size: 10pt; margin-top: 10px;"><thead style="background-color: #f9fafb;"><tr><th style="text-align: left; padding: 8px; border-bottom: 2px solid #ccc;">Description</th><th style="text-align: center; padding: 8px; border-bottom: 2px solid #ccc;">Qty</th><th style="text-align: right; padding: 8px; border-bottom: 2px solid #ccc;">MRC</th><th style="text-align: right; padding: 8px; border-bottom: 2px solid #ccc;">NRC</th></tr></thead><tbody>{}</tbody></table>"#,
        rows
    )
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

pub fn confirmation_subject(req: &ConfirmationEmailRequest) -> String {
    format!("Contract Signed Confirmation: {} - {}", req.business_name, req.option_title)
}

pub fn confirmation_body(req: &ConfirmationEmailRequest, company_name: &str, line_items_html: &str) -> String {
    let signer = escape_html(or_default(&req.signer_name, "Customer"));
    format!(
        r#"<html><body>
<p>Hello {signer},</p>
<p>Thank you for signing the Service Agreement with {company} for <strong>{business}</strong>.</p>
<p>This email confirms your selection and signing details:</p>
<div style="background-color: #f9f9f9; border: 1px solid #eee; padding: 15px; margin: 15px 0;">
<h3 style="margin-top: 0;">Selected Option:</h3>
<ul>
<li><strong>Title:</strong> {title}</li>
<li><strong>Term:</strong> {term} Months</li>
<li><strong>Total Monthly Recurring Charge (MRC):</strong> ${mrc}</li>
<li><strong>Total Non-Recurring Charge (NRC):</strong> ${nrc}</li>
</ul>
<div style="margin-top: 15px;">
<h4 style="margin-bottom: 5px;">Line Item Summary:</h4>
{line_items}
</div>
</div>
<p><strong>Signed By:</strong> {signed_by}</p>
<p><strong>Date Signed:</strong> {signed_date}</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
<p>You can view the full signed contract details online at any time by visiting the link below:</p>
<p><a href="{link}" style="color: #2563EB; text-decoration: none;">View Signed Contract</a></p>
<p style="margin-top: 20px;">If you have any questions, please contact your {company} representative.</p>
<br>
<p>Sincerely,</p>
<p>The {company} Team</p>
</body></html>"#,
        signer = signer,
        company = escape_html(company_name),
        business = escape_html(&req.business_name),
        title = escape_html(&req.option_title),
        term = req.option_term,
        mrc = escape_html(&req.option_mrc),
        nrc = escape_html(&req.option_nrc),
        line_items = line_items_html,
        signed_by = escape_html(or_default(&req.signer_name, "N/A")),
        signed_date = escape_html(or_default(&req.signed_date, "N/A")),
        link = escape_html(&req.contract_link),
    )
}

// =========================================================================
//  SERVIÇO
// =========================================================================

#[derive(Clone)]
pub struct NotificationSettings {
    pub admin_recipient: String,
    pub company_name: String,
    pub view_base_url: String,
}

#[derive(Clone)]
pub struct NotificationService {
    relay: Arc<dyn EmailRelay>,
    contracts: ContractService,
    settings: NotificationSettings,
}

impl NotificationService {
    pub fn new(relay: Arc<dyn EmailRelay>, contracts: ContractService, settings: NotificationSettings) -> Self {
        Self { relay, contracts, settings }
    }

    /// Link público: `<view-url>?id=<shareableId>`.
    pub fn contract_link(&self, shareable_id: &str) -> String {
        format!("{}?id={}", self.settings.view_base_url.trim_end_matches('?'), shareable_id)
    }

    /// Monta a requisição de confirmação a partir de um contrato assinado.
    pub fn confirmation_request(
        &self,
        contract: &Contract,
        option: &ContractOption,
    ) -> Result<ConfirmationEmailRequest, AppError> {
        let signature = contract.signature.as_ref().ok_or_else(|| {
            AppError::InvalidInput(format!("Contrato {} ainda não foi assinado.", contract.id))
        })?;

        Ok(ConfirmationEmailRequest {
            to_email: contract.customer_email.clone(),
            contract_id: contract.id.to_string(),
            business_name: contract.business_name.clone(),
            signer_name: signature.signer_name.clone(),
            signed_date: signature.signed_at.format("%m/%d/%Y").to_string(),
            option_title: option.title.clone(),
            option_term: option.term_months,
            option_mrc: money(option.total_mrc),
            option_nrc: money(option.total_nrc),
            contract_link: self.contract_link(&contract.shareable_id),
            selected_option_id: option.id.to_string(),
        })
    }

    /// Envia para os destinatários + o administrador fixo. A falha é devolvida ao chamador.
    pub async fn dispatch(&self, to: &[String], subject: String, html_body: String) -> Result<(), AppError> {
        let recipients = recipients(to, &self.settings.admin_recipient);
        if recipients.is_empty() {
            tracing::info!("sem destinatários; envio ignorado");
            return Ok(());
        }

        let message = EmailMessage { to: recipients.join(","), subject, html_body };
        self.relay.send(&message).await?;
        tracing::info!(to = %message.to, "e-mail entregue ao relay");
        Ok(())
    }

    async fn line_items_html(&self, contract_id: Uuid, option_id: Uuid) -> String {
        match self.contracts.get_option(contract_id, option_id).await {
            Ok(option) if option.line_items.is_empty() => {
                "<p>(Option selected, but no line item details were saved.)</p>".to_string()
            }
            Ok(option) => line_items_table(&option.line_items),
            Err(e) => {
                tracing::warn!(contract_id = %contract_id, option_id = %option_id, error = %e, "linhas indisponíveis para o e-mail");
                "<p>(Line item details could not be loaded.)</p>".to_string()
            }
        }
    }

    /// Só confirma o que está gravado: contrato assinado, opção escolhida e e-mail do cliente.
    async fn authorize(&self, req: &ConfirmationEmailRequest) -> Result<(Uuid, Uuid), AppError> {
        let contract_id = Uuid::parse_str(req.contract_id.trim())
            .map_err(|_| AppError::InvalidInput(format!("contractId inválido: {}", req.contract_id)))?;
        let option_id = Uuid::parse_str(req.selected_option_id.trim()).map_err(|_| {
            AppError::InvalidInput(format!("selectedOptionId inválido: {}", req.selected_option_id))
        })?;

        let contract = self.contracts.get_contract(contract_id).await?;
        if contract.status.is_editable() {
            return Err(AppError::Forbidden(format!("Contrato {} ainda não foi assinado.", contract_id)));
        }
        if contract.selected_option_id != Some(option_id) {
            return Err(AppError::Forbidden(format!(
                "Opção {} não é a opção assinada do contrato {}.",
                option_id, contract_id
            )));
        }
        if !req.to_email.trim().eq_ignore_ascii_case(contract.customer_email.trim()) {
            return Err(AppError::Forbidden(format!(
                "Destinatário não corresponde ao cliente do contrato {}.",
                contract_id
            )));
        }
        Ok((contract_id, option_id))
    }

    /// A função de confirmação: valida a entrada contra o contrato gravado, busca as linhas da opção e envia.
    pub async fn send_signed_confirmation(
        &self,
        req: &ConfirmationEmailRequest,
    ) -> Result<ConfirmationEmailResponse, AppError> {
        let missing: Vec<&str> = [
            ("toEmail", &req.to_email),
            ("contractId", &req.contract_id),
            ("optionTitle", &req.option_title),
            ("selectedOptionId", &req.selected_option_id),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();
        if !missing.is_empty() {
            return Err(AppError::InvalidInput(format!("Campos obrigatórios ausentes: {}", missing.join(", "))));
        }

        let (contract_id, option_id) = self.authorize(req).await?;
        let line_items = self.line_items_html(contract_id, option_id).await;
        let subject = confirmation_subject(req);
        let body = confirmation_body(req, &self.settings.company_name, &line_items);

        self.dispatch(std::slice::from_ref(&req.to_email), subject, body).await?;
        tracing::info!(contract_id = %req.contract_id, to = %req.to_email, "confirmação de assinatura enviada");
        Ok(ConfirmationEmailResponse { success: true })
    }
}
