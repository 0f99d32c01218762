// src/services/contract_service.rs

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Months, NaiveDate, Utc};
use futures::future::join_all;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::ContractStore,
    models::{
        auth::AdminIdentity,
        contract::{
            Contract, ContractDetail, ContractOption, ContractPayload, ContractStatus,
            ContractSummary, OptionPayload, PublicContractView, Signature, INSTALLATION_DISCLAIMER,
        },
    },
    services::pricing,
};

pub const NOT_APPLICABLE: &str = "N/A";
pub const UNKNOWN_OPTION: &str = "Unknown Option";
pub const OPTION_UNAVAILABLE: &str = "Error loading option";

const SHAREABLE_ID_LEN: usize = 8;
const SHAREABLE_ID_ATTEMPTS: usize = 5;

// =========================================================================
//  REGRAS DE NORMALIZAÇÃO
// =========================================================================

/// Token público de 8 caracteres tirado de um UUID v4.
pub fn generate_shareable_id() -> String {
    Uuid::new_v4().simple().to_string()[..SHAREABLE_ID_LEN].to_string()
}

/// Endereço principal primeiro, sem vazios e sem repetições.
pub fn normalize_site_addresses(primary: &str, additional: &[String]) -> Vec<String> {
    let mut sites: Vec<String> = Vec::with_capacity(additional.len() + 1);
    for address in std::iter::once(primary).chain(additional.iter().map(String::as_str)) {
        let address = address.trim();
        if !address.is_empty() && !sites.iter().any(|s| s == address) {
            sites.push(address.to_string());
        }
    }
    sites
}

/// Texto do cronograma com o aviso fixo no final. Reenviar um texto que já termina
/// com o aviso não o duplica.
pub fn installation_schedule_text(input: &str) -> String {
    let text = input.trim();
    let text = text.strip_suffix(INSTALLATION_DISCLAIMER).unwrap_or(text).trim_end();
    if text.is_empty() {
        INSTALLATION_DISCLAIMER.to_string()
    } else {
        format!("{} {}", text, INSTALLATION_DISCLAIMER)
    }
}

/// Data de término: assinatura + prazo, com o dia limitado ao fim do mês quando necessário.
pub fn expiration_date(signed_at: DateTime<Utc>, term_months: u32) -> Option<NaiveDate> {
    if term_months == 0 {
        return None;
    }
    signed_at
        .checked_add_months(Months::new(term_months))
        .map(|d| d.date_naive())
}

/// Opções sem nenhum item precificado são descartadas; sobrar nenhuma é erro de validação.
fn build_options(contract_id: Uuid, payloads: &[OptionPayload]) -> Result<Vec<ContractOption>, AppError> {
    let options: Vec<ContractOption> = payloads
        .iter()
        .filter_map(|payload| {
            let line_items = pricing::normalize_line_items(&payload.line_items);
            if !pricing::has_priced_items(&line_items) {
                return None;
            }
            let totals = pricing::compute_totals(&line_items);
            Some((payload, line_items, totals))
        })
        .enumerate()
        .map(|(position, (payload, line_items, totals))| ContractOption {
            id: Uuid::new_v4(),
            contract_id,
            title: payload.title.trim().to_string(),
            term_months: pricing::parse_term(&payload.term_months),
            total_mrc: totals.mrc,
            total_nrc: totals.nrc,
            line_items,
            position: position as i32,
        })
        .collect();

    if options.is_empty() {
        return Err(AppError::InvalidInput(
            "O contrato precisa de pelo menos uma opção com um item precificado.".into(),
        ));
    }
    Ok(options)
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!("O campo '{}' é obrigatório.", field)));
    }
    Ok(value.to_string())
}

/// Copia os campos editáveis do payload para o documento.
fn apply_payload(contract: &mut Contract, payload: &ContractPayload) -> Result<(), AppError> {
    let service_address = required(&payload.service_address, "serviceAddress")?;

    contract.business_name = required(&payload.business_name, "businessName")?;
    contract.customer_email = required(&payload.customer_email, "customerEmail")?;
    contract.agent_business_name = payload
        .agent_business_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    contract.is_billing_same_as_service = payload.is_billing_same_as_service;
    contract.billing_address = if payload.is_billing_same_as_service {
        service_address.clone()
    } else {
        required(&payload.billing_address, "billingAddress")?
    };
    contract.multi_site_addresses = normalize_site_addresses(&service_address, &payload.multi_site_addresses);
    contract.service_address = service_address;
    contract.installation_schedule_text = installation_schedule_text(&payload.installation_schedule);
    Ok(())
}

// =========================================================================
//  SERVIÇO (ciclo de vida)
// =========================================================================

#[derive(Clone)]
pub struct ContractService {
    store: Arc<dyn ContractStore>,
    store_timeout: Duration,
}

impl ContractService {
    pub fn new(store: Arc<dyn ContractStore>, store_timeout: Duration) -> Self {
        Self { store, store_timeout }
    }

    // Toda chamada ao armazenamento passa por aqui para ter um tempo limite.
    async fn guard<T, F>(&self, op: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.store_timeout.as_millis() as u64, "timeout no armazenamento");
                Err(AppError::StoreTimeout(op))
            }
        }
    }

    async fn load(&self, contract_id: Uuid) -> Result<Contract, AppError> {
        self.guard("get_contract", self.store.get_contract(contract_id))
            .await?
            .ok_or_else(|| AppError::ContractNotFound(contract_id.to_string()))
    }

    // A escrita condicional falhou: descobre se foi mudança de status ou só de versão.
    async fn write_conflict(&self, contract_id: Uuid) -> AppError {
        match self.load(contract_id).await {
            Ok(current) if !current.status.is_editable() => AppError::NotEditable(current.status),
            Ok(_) => AppError::VersionConflict(contract_id),
            Err(e) => e,
        }
    }

    // --- CRIAÇÃO ---

    pub async fn create_contract(
        &self,
        admin: &AdminIdentity,
        payload: ContractPayload,
    ) -> Result<ContractDetail, AppError> {
        payload.validate()?;

        let id = Uuid::new_v4();
        let options = build_options(id, &payload.options)?;

        let mut contract = Contract {
            id,
            shareable_id: String::new(),
            business_name: String::new(),
            agent_business_name: None,
            customer_email: String::new(),
            service_address: String::new(),
            is_billing_same_as_service: true,
            billing_address: String::new(),
            multi_site_addresses: Vec::new(),
            installation_schedule_text: String::new(),
            status: ContractStatus::Draft,
            created_at: Utc::now(),
            admin_id: admin.id.clone(),
            selected_option_id: None,
            signature: None,
            version: 1,
        };
        apply_payload(&mut contract, &payload)?;

        // Colisão do token curto é rara; basta sortear outro.
        for attempt in 1..=SHAREABLE_ID_ATTEMPTS {
            contract.shareable_id = generate_shareable_id();
            match self
                .guard("insert_contract", self.store.insert_contract(&contract, &options))
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        contract_id = %contract.id,
                        shareable_id = %contract.shareable_id,
                        options = options.len(),
                        admin_id = %admin.id,
                        "contrato criado"
                    );
                    return Ok(ContractDetail { contract, options });
                }
                Err(AppError::DuplicateShareableId(sid)) => {
                    tracing::warn!(attempt, shareable_id = %sid, "colisão de identificador público");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::InternalServerError(anyhow::anyhow!(
            "não foi possível gerar um identificador público único"
        )))
    }

    // --- EDIÇÃO ---

    /// Substitui os campos e o conjunto inteiro de opções. Só vale para rascunhos.
    pub async fn update_contract(
        &self,
        contract_id: Uuid,
        payload: ContractPayload,
    ) -> Result<ContractDetail, AppError> {
        payload.validate()?;
        let options = build_options(contract_id, &payload.options)?;

        let current = self.load(contract_id).await?;
        if !current.status.is_editable() {
            return Err(AppError::NotEditable(current.status));
        }

        let mut updated = current.clone();
        apply_payload(&mut updated, &payload)?;
        updated.version = current.version + 1;

        // Contrato e opções numa única escrita condicional.
        if !self
            .guard(
                "update_draft",
                self.store.update_draft(&updated, current.version, Some(&options)),
            )
            .await?
        {
            return Err(self.write_conflict(contract_id).await);
        }

        tracing::info!(contract_id = %contract_id, version = updated.version, options = options.len(), "contrato atualizado");
        Ok(ContractDetail { contract: updated, options })
    }

    // --- ASSINATURA ---

    pub async fn sign_contract(
        &self,
        contract_id: Uuid,
        option_id: Uuid,
        signature: Signature,
    ) -> Result<(Contract, ContractOption), AppError> {
        let current = self.load(contract_id).await?;
        if !current.status.can_transition_to(ContractStatus::Signed) {
            return Err(AppError::NotEditable(current.status));
        }

        signature.validate_payload().map_err(AppError::InvalidInput)?;

        let option = self
            .guard("get_option", self.store.get_option(contract_id, option_id))
            .await?
            .ok_or(AppError::OptionNotFound(option_id))?;

        let mut signed = current.clone();
        signed.status = ContractStatus::Signed;
        signed.selected_option_id = Some(option.id);
        signed.signature = Some(signature);
        signed.version = current.version + 1;

        if !self
            .guard("update_draft", self.store.update_draft(&signed, current.version, None))
            .await?
        {
            return Err(self.write_conflict(contract_id).await);
        }

        tracing::info!(contract_id = %contract_id, option_id = %option.id, "contrato assinado");
        Ok((signed, option))
    }

    // --- EXCLUSÃO ---

    /// Apaga as opções (em paralelo) e só depois o contrato. Se alguma opção falhar,
    /// o contrato fica intacto e a operação inteira pode ser repetida.
    pub async fn delete_contract(&self, contract_id: Uuid) -> Result<usize, AppError> {
        self.load(contract_id).await?;

        let options = self
            .guard("list_options", self.store.list_options(contract_id))
            .await?;

        let results = join_all(options.iter().map(|option| {
            self.guard("delete_option", self.store.delete_option(contract_id, option.id))
        }))
        .await;

        let mut failed = 0;
        for (option, result) in options.iter().zip(&results) {
            if let Err(e) = result {
                failed += 1;
                tracing::error!(contract_id = %contract_id, option_id = %option.id, error = %e, "falha ao apagar opção");
            }
        }
        if failed > 0 {
            return Err(AppError::PartialDelete { contract_id, failed });
        }

        // Confirma que a subcoleção ficou vazia antes de apagar o pai.
        let remaining = self
            .guard("list_options", self.store.list_options(contract_id))
            .await?;
        if !remaining.is_empty() {
            return Err(AppError::PartialDelete { contract_id, failed: remaining.len() });
        }

        if !self
            .guard("delete_contract", self.store.delete_contract(contract_id))
            .await?
        {
            return Err(AppError::ContractNotFound(contract_id.to_string()));
        }

        tracing::info!(contract_id = %contract_id, options = options.len(), "contrato apagado");
        Ok(options.len())
    }

    // --- LEITURA ---

    pub async fn get_contract(&self, contract_id: Uuid) -> Result<Contract, AppError> {
        self.load(contract_id).await
    }

    pub async fn get_contract_detail(&self, contract_id: Uuid) -> Result<ContractDetail, AppError> {
        let contract = self.load(contract_id).await?;
        let options = self
            .guard("list_options", self.store.list_options(contract_id))
            .await?;
        Ok(ContractDetail { contract, options })
    }

    pub async fn get_option(&self, contract_id: Uuid, option_id: Uuid) -> Result<ContractOption, AppError> {
        self.guard("get_option", self.store.get_option(contract_id, option_id))
            .await?
            .ok_or(AppError::OptionNotFound(option_id))
    }

    pub async fn find_by_shareable_id(&self, shareable_id: &str) -> Result<Contract, AppError> {
        self.guard("find_by_shareable_id", self.store.find_by_shareable_id(shareable_id))
            .await?
            .ok_or_else(|| AppError::ContractNotFound(shareable_id.to_string()))
    }

    /// Visão do cliente: opções para escolher enquanto é rascunho, resumo travado depois.
    pub async fn public_view(&self, shareable_id: &str) -> Result<PublicContractView, AppError> {
        let contract = self.find_by_shareable_id(shareable_id).await?;

        if contract.status.is_editable() {
            let options = self
                .guard("list_options", self.store.list_options(contract.id))
                .await?;
            return Ok(PublicContractView { contract, locked: false, options, selected_option: None });
        }

        let selected_option = match contract.selected_option_id {
            Some(option_id) => match self.get_option(contract.id, option_id).await {
                Ok(option) => Some(option),
                Err(e) => {
                    tracing::warn!(contract_id = %contract.id, error = %e, "opção selecionada indisponível");
                    None
                }
            },
            None => None,
        };

        Ok(PublicContractView { contract, locked: true, options: Vec::new(), selected_option })
    }

    async fn summarize(&self, contract: Contract) -> ContractSummary {
        let mut option_label = NOT_APPLICABLE.to_string();
        let mut option_term_months = None;

        if !contract.status.is_editable() {
            if let Some(option_id) = contract.selected_option_id {
                match self
                    .guard("get_option", self.store.get_option(contract.id, option_id))
                    .await
                {
                    Ok(Some(option)) => {
                        option_label = if option.title.is_empty() {
                            UNKNOWN_OPTION.to_string()
                        } else {
                            option.title
                        };
                        option_term_months = Some(option.term_months);
                    }
                    Ok(None) => option_label = UNKNOWN_OPTION.to_string(),
                    Err(e) => {
                        // Só enriquece a linha; não derruba a listagem.
                        tracing::warn!(contract_id = %contract.id, option_id = %option_id, error = %e, "falha ao resolver opção");
                        option_label = OPTION_UNAVAILABLE.to_string();
                    }
                }
            }
        }

        let signed_at = contract.signature.as_ref().map(|s| s.signed_at);
        let expiration_date = signed_at
            .zip(option_term_months)
            .and_then(|(at, term)| expiration_date(at, term));

        ContractSummary {
            option_label,
            option_term_months,
            signed_date: signed_at.map(|at| at.date_naive()),
            expiration_date,
            contract,
        }
    }

    /// Listagem administrativa; resolve as opções selecionadas em paralelo.
    pub async fn list_contracts(&self) -> Result<Vec<ContractSummary>, AppError> {
        let contracts = self.guard("list_contracts", self.store.list_contracts()).await?;
        Ok(join_all(contracts.into_iter().map(|c| self.summarize(c))).await)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        db::InMemoryContractStore,
        models::contract::{LineItemPayload, SignatureKind},
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::{collections::HashSet, sync::Mutex};

    pub(crate) fn admin() -> AdminIdentity {
        AdminIdentity { id: "admin-1".into(), email: "admin@example.com".into() }
    }

    pub(crate) fn priced_option(title: &str, items: serde_json::Value) -> OptionPayload {
        OptionPayload {
            title: title.into(),
            term_months: json!(24),
            line_items: serde_json::from_value(items).unwrap(),
        }
    }

    pub(crate) fn payload(options: Vec<OptionPayload>) -> ContractPayload {
        ContractPayload {
            business_name: "Acme Dental".into(),
            agent_business_name: Some("  ".into()),
            customer_email: "owner@acme.example".into(),
            service_address: "A".into(),
            is_billing_same_as_service: true,
            billing_address: String::new(),
            multi_site_addresses: vec!["A".into(), "B".into(), "A".into(), "".into()],
            installation_schedule: "Two weeks.".into(),
            options,
        }
    }

    pub(crate) fn typed_signature(name: &str) -> Signature {
        Signature {
            signer_name: name.into(),
            signed_at: Utc::now(),
            kind: SignatureKind::Typed,
            data: name.into(),
        }
    }

    pub(crate) fn service(store: Arc<dyn ContractStore>) -> ContractService {
        ContractService::new(store, Duration::from_secs(2))
    }

    fn one_option() -> Vec<OptionPayload> {
        vec![priced_option(
            "Fiber",
            json!([
                { "type": "header", "value": "Internet" },
                { "type": "item", "description": "1G", "qty": 2, "mrc": 10, "nrc": 5 },
                { "type": "item", "description": "IP", "qty": 1, "mrc": "$3", "nrc": "" }
            ]),
        )]
    }

    // Armazenamento com falhas injetadas, delegando o resto à memória.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryContractStore,
        failing_deletes: Mutex<HashSet<Uuid>>,
        failing_option_reads: Mutex<HashSet<Uuid>>,
        reject_writes: Mutex<bool>,
        stall_reads: Mutex<bool>,
        // Segura a escrita que troca opções até `resume` ser sinalizado.
        pause_option_writes: Mutex<bool>,
        paused: tokio::sync::Notify,
        resume: tokio::sync::Notify,
    }

    #[async_trait]
    impl ContractStore for FlakyStore {
        async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, AppError> {
            let stall = *self.stall_reads.lock().unwrap();
            if stall {
                std::future::pending::<()>().await;
            }
            self.inner.get_contract(id).await
        }
        async fn find_by_shareable_id(&self, sid: &str) -> Result<Option<Contract>, AppError> {
            self.inner.find_by_shareable_id(sid).await
        }
        async fn list_contracts(&self) -> Result<Vec<Contract>, AppError> {
            self.inner.list_contracts().await
        }
        async fn insert_contract(&self, c: &Contract, o: &[ContractOption]) -> Result<(), AppError> {
            self.inner.insert_contract(c, o).await
        }
        async fn update_draft(
            &self,
            c: &Contract,
            v: i64,
            o: Option<&[ContractOption]>,
        ) -> Result<bool, AppError> {
            let reject = *self.reject_writes.lock().unwrap();
            if reject {
                return Ok(false);
            }
            let pause = o.is_some() && *self.pause_option_writes.lock().unwrap();
            if pause {
                self.paused.notify_one();
                self.resume.notified().await;
            }
            self.inner.update_draft(c, v, o).await
        }
        async fn list_options(&self, id: Uuid) -> Result<Vec<ContractOption>, AppError> {
            self.inner.list_options(id).await
        }
        async fn get_option(&self, cid: Uuid, oid: Uuid) -> Result<Option<ContractOption>, AppError> {
            let fail = self.failing_option_reads.lock().unwrap().contains(&oid);
            if fail {
                return Err(AppError::InternalServerError(anyhow::anyhow!("leitura falhou")));
            }
            self.inner.get_option(cid, oid).await
        }
        async fn delete_option(&self, cid: Uuid, oid: Uuid) -> Result<bool, AppError> {
            let fail = self.failing_deletes.lock().unwrap().contains(&oid);
            if fail {
                return Err(AppError::InternalServerError(anyhow::anyhow!("delete falhou")));
            }
            self.inner.delete_option(cid, oid).await
        }
        async fn delete_contract(&self, id: Uuid) -> Result<bool, AppError> {
            self.inner.delete_contract(id).await
        }
    }

    #[test]
    fn site_addresses_are_deduplicated_with_primary_first() {
        let extra = vec!["A".to_string(), "B".to_string(), "A".to_string(), "".to_string()];
        assert_eq!(normalize_site_addresses("A", &extra), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            normalize_site_addresses(" A ", &["C".to_string(), " ".to_string()]),
            vec!["A".to_string(), "C".to_string()]
        );
    }

    #[test]
    fn installation_schedule_always_ends_with_disclaimer_once() {
        let text = installation_schedule_text("  Two weeks. ");
        assert_eq!(text, format!("Two weeks. {}", INSTALLATION_DISCLAIMER));
        assert_eq!(installation_schedule_text(&text), text);
        assert_eq!(installation_schedule_text(""), INSTALLATION_DISCLAIMER);
    }

    #[test]
    fn shareable_id_is_eight_hex_chars() {
        let sid = generate_shareable_id();
        assert_eq!(sid.len(), 8);
        assert!(sid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn expiration_rolls_over_years_and_clamps_month_end() {
        let at = Utc.with_ymd_and_hms(2025, 11, 15, 12, 0, 0).unwrap();
        assert_eq!(expiration_date(at, 3), NaiveDate::from_ymd_opt(2026, 2, 15));

        let at = Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(expiration_date(at, 1), NaiveDate::from_ymd_opt(2026, 2, 28));
        assert_eq!(expiration_date(at, 0), None);
    }

    #[tokio::test]
    async fn create_without_priced_options_is_a_validation_error() {
        let svc = service(Arc::new(InMemoryContractStore::new()));
        let header_only = priced_option("Vazio", json!([{ "type": "header", "value": "Só título" }]));

        let err = svc.create_contract(&admin(), payload(vec![header_only])).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = svc.create_contract(&admin(), payload(vec![])).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn create_rejects_malformed_email() {
        let svc = service(Arc::new(InMemoryContractStore::new()));
        let mut bad = payload(one_option());
        bad.customer_email = "not-an-email".into();
        let err = svc.create_contract(&admin(), bad).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn created_contract_reads_back_with_same_totals() {
        let svc = service(Arc::new(InMemoryContractStore::new()));
        let mut options = one_option();
        options.push(priced_option("Só cabeçalho", json!([{ "type": "header", "value": "x" }])));

        let created = svc.create_contract(&admin(), payload(options)).await.unwrap();
        assert_eq!(created.options.len(), 1);
        assert_eq!(created.contract.status, ContractStatus::Draft);
        assert_eq!(created.contract.admin_id, "admin-1");
        assert_eq!(created.contract.agent_business_name, None);
        assert_eq!(created.contract.multi_site_addresses, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(created.contract.billing_address, "A");

        let read = svc.get_contract_detail(created.contract.id).await.unwrap();
        assert_eq!(read.options, created.options);
        assert_eq!(read.options[0].total_mrc, Decimal::new(2300, 2));
        assert_eq!(read.options[0].total_nrc, Decimal::new(1000, 2));
        assert_eq!(read.options[0].term_months, 24);
    }

    #[tokio::test]
    async fn update_replaces_the_whole_option_set() {
        let store = Arc::new(InMemoryContractStore::new());
        let svc = service(store.clone());

        let mut two = one_option();
        two.push(priced_option("Copper", json!([{ "type": "item", "description": "DSL", "mrc": 40 }])));
        let created = svc.create_contract(&admin(), payload(two)).await.unwrap();
        let old_ids: Vec<Uuid> = created.options.iter().map(|o| o.id).collect();
        assert_eq!(old_ids.len(), 2);

        let updated = svc
            .update_contract(created.contract.id, payload(one_option()))
            .await
            .unwrap();
        assert_eq!(updated.contract.version, created.contract.version + 1);

        let read = svc.get_contract_detail(created.contract.id).await.unwrap();
        assert_eq!(read.options.len(), 1);
        for old in old_ids {
            assert!(store.get_option(created.contract.id, old).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn signed_contract_cannot_be_edited_or_signed_again() {
        let svc = service(Arc::new(InMemoryContractStore::new()));
        let created = svc.create_contract(&admin(), payload(one_option())).await.unwrap();
        let id = created.contract.id;
        let option_id = created.options[0].id;

        let (signed, option) = svc.sign_contract(id, option_id, typed_signature("Jane")).await.unwrap();
        assert_eq!(signed.status, ContractStatus::Signed);
        assert_eq!(option.id, option_id);

        let err = svc.sign_contract(id, option_id, typed_signature("Mallory")).await.unwrap_err();
        assert!(matches!(err, AppError::NotEditable(ContractStatus::Signed)));

        let err = svc.update_contract(id, payload(one_option())).await.unwrap_err();
        assert!(matches!(err, AppError::NotEditable(ContractStatus::Signed)));

        let read = svc.get_contract_detail(id).await.unwrap();
        assert_eq!(read.contract.signature.unwrap().signer_name, "Jane");
        assert_eq!(read.options, created.options);
    }

    #[tokio::test]
    async fn sign_requires_an_option_of_this_contract() {
        let svc = service(Arc::new(InMemoryContractStore::new()));
        let a = svc.create_contract(&admin(), payload(one_option())).await.unwrap();
        let b = svc.create_contract(&admin(), payload(one_option())).await.unwrap();

        let err = svc
            .sign_contract(a.contract.id, b.options[0].id, typed_signature("Jane"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::OptionNotFound(_)));

        let err = svc
            .sign_contract(a.contract.id, a.options[0].id, typed_signature(" "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let read = svc.get_contract_detail(a.contract.id).await.unwrap();
        assert_eq!(read.contract.status, ContractStatus::Draft);
        assert!(read.contract.signature.is_none());
    }

    #[tokio::test]
    async fn lost_conditional_write_is_a_version_conflict() {
        let store = Arc::new(FlakyStore::default());
        let svc = service(store.clone());
        let created = svc.create_contract(&admin(), payload(one_option())).await.unwrap();

        *store.reject_writes.lock().unwrap() = true;
        let err = svc
            .sign_contract(created.contract.id, created.options[0].id, typed_signature("Jane"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::VersionConflict(_)));
    }

    #[tokio::test]
    async fn sign_landing_mid_update_keeps_the_signed_option_set() {
        let store = Arc::new(FlakyStore::default());
        let svc = service(store.clone());
        let created = svc.create_contract(&admin(), payload(one_option())).await.unwrap();
        let id = created.contract.id;
        let signed_option = created.options[0].id;

        *store.pause_option_writes.lock().unwrap() = true;
        let update = svc.update_contract(
            id,
            payload(vec![priced_option("Copper", json!([{ "type": "item", "mrc": 99 }]))]),
        );
        let sign = async {
            store.paused.notified().await;
            let result = svc.sign_contract(id, signed_option, typed_signature("Jane")).await;
            store.resume.notify_one();
            result
        };
        let (updated, signed) = tokio::join!(update, sign);

        assert!(signed.is_ok());
        assert!(matches!(updated, Err(AppError::NotEditable(ContractStatus::Signed))));

        let read = svc.get_contract_detail(id).await.unwrap();
        assert_eq!(read.contract.status, ContractStatus::Signed);
        assert_eq!(read.contract.selected_option_id, Some(signed_option));
        assert_eq!(read.options.iter().map(|o| o.id).collect::<Vec<_>>(), vec![signed_option]);
        assert_eq!(read.options[0].title, "Fiber");
    }

    #[tokio::test]
    async fn delete_cascades_to_every_option() {
        let store = Arc::new(InMemoryContractStore::new());
        let svc = service(store.clone());

        let mut three = one_option();
        three.push(priced_option("B", json!([{ "type": "item", "mrc": 1 }])));
        three.push(priced_option("C", json!([{ "type": "item", "nrc": 1 }])));
        let created = svc.create_contract(&admin(), payload(three)).await.unwrap();

        let removed = svc.delete_contract(created.contract.id).await.unwrap();
        assert_eq!(removed, 3);
        assert!(store.list_options(created.contract.id).await.unwrap().is_empty());
        assert!(store.get_contract(created.contract.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_option_delete_keeps_the_parent() {
        let store = Arc::new(FlakyStore::default());
        let svc = service(store.clone());

        let mut two = one_option();
        two.push(priced_option("B", json!([{ "type": "item", "mrc": 1 }])));
        let created = svc.create_contract(&admin(), payload(two)).await.unwrap();
        store.failing_deletes.lock().unwrap().insert(created.options[1].id);

        let err = svc.delete_contract(created.contract.id).await.unwrap_err();
        assert!(matches!(err, AppError::PartialDelete { failed: 1, .. }));
        assert!(store.get_contract(created.contract.id).await.unwrap().is_some());

        // Repetir a operação inteira conclui a exclusão.
        store.failing_deletes.lock().unwrap().clear();
        assert_eq!(svc.delete_contract(created.contract.id).await.unwrap(), 1);
        assert!(store.get_contract(created.contract.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_degrades_rows_whose_option_lookup_fails() {
        let store = Arc::new(FlakyStore::default());
        let svc = service(store.clone());

        let ok = svc.create_contract(&admin(), payload(one_option())).await.unwrap();
        let broken = svc.create_contract(&admin(), payload(one_option())).await.unwrap();
        let draft = svc.create_contract(&admin(), payload(one_option())).await.unwrap();

        svc.sign_contract(ok.contract.id, ok.options[0].id, typed_signature("Ann")).await.unwrap();
        svc.sign_contract(broken.contract.id, broken.options[0].id, typed_signature("Bob")).await.unwrap();
        store.failing_option_reads.lock().unwrap().insert(broken.options[0].id);

        let rows = svc.list_contracts().await.unwrap();
        assert_eq!(rows.len(), 3);

        let row = |id: Uuid| rows.iter().find(|r| r.contract.id == id).unwrap();
        assert_eq!(row(ok.contract.id).option_label, "Fiber");
        assert_eq!(row(ok.contract.id).option_term_months, Some(24));
        assert!(row(ok.contract.id).expiration_date.is_some());
        assert_eq!(row(broken.contract.id).option_label, OPTION_UNAVAILABLE);
        assert!(row(broken.contract.id).signed_date.is_some());
        assert!(row(broken.contract.id).expiration_date.is_none());
        assert_eq!(row(draft.contract.id).option_label, NOT_APPLICABLE);
    }

    #[tokio::test]
    async fn public_view_hides_options_once_signed() {
        let svc = service(Arc::new(InMemoryContractStore::new()));
        let created = svc.create_contract(&admin(), payload(one_option())).await.unwrap();
        let sid = created.contract.shareable_id.clone();

        let view = svc.public_view(&sid).await.unwrap();
        assert!(!view.locked);
        assert_eq!(view.options.len(), 1);

        svc.sign_contract(created.contract.id, created.options[0].id, typed_signature("Jane"))
            .await
            .unwrap();
        let view = svc.public_view(&sid).await.unwrap();
        assert!(view.locked);
        assert!(view.options.is_empty());
        assert_eq!(view.selected_option.map(|o| o.id), Some(created.options[0].id));

        let err = svc.public_view("nope0000").await.unwrap_err();
        assert!(matches!(err, AppError::ContractNotFound(_)));
    }

    #[tokio::test]
    async fn stalled_store_calls_time_out() {
        let store = Arc::new(FlakyStore::default());
        let svc = ContractService::new(store.clone(), Duration::from_millis(50));
        *store.stall_reads.lock().unwrap() = true;

        let err = svc.get_contract_detail(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::StoreTimeout("get_contract")));
    }

    #[test]
    fn unknown_line_item_types_do_not_count_as_priced() {
        let option = OptionPayload {
            title: "X".into(),
            term_months: json!(null),
            line_items: vec![LineItemPayload::Unknown],
        };
        assert!(build_options(Uuid::new_v4(), &[option]).is_err());
    }
}
