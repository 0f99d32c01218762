// src/db/contract_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContractStore,
    models::contract::{
        Contract, ContractOption, ContractStatus, LineItemPayload, Signature, DEFAULT_TERM_MONTHS,
    },
    services::pricing,
};

// =========================================================================
//  LINHAS DO BANCO (fronteira de leitura: tudo é revalidado aqui)
// =========================================================================

#[derive(Debug, FromRow)]
struct ContractRow {
    id: Uuid,
    shareable_id: String,
    business_name: String,
    agent_business_name: Option<String>,
    customer_email: String,
    service_address: String,
    is_billing_same_as_service: bool,
    billing_address: String,
    multi_site_addresses: Vec<String>,
    installation_schedule_text: String,
    status: String,
    created_at: DateTime<Utc>,
    admin_id: String,
    selected_option_id: Option<Uuid>,
    signature: Option<Json<Value>>,
    version: i64,
}

impl TryFrom<ContractRow> for Contract {
    type Error = AppError;

    fn try_from(row: ContractRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ContractStatus>()
            .map_err(|e| AppError::MalformedDocument(format!("contrato {}: {}", row.id, e)))?;

        let signature = row
            .signature
            .map(|Json(value)| serde_json::from_value::<Signature>(value))
            .transpose()
            .map_err(|e| AppError::MalformedDocument(format!("assinatura do contrato {}: {}", row.id, e)))?;

        // Endereço principal sempre primeiro, mesmo que o documento tenha sido editado por fora.
        let mut multi_site_addresses = row.multi_site_addresses;
        if multi_site_addresses.first() != Some(&row.service_address) {
            multi_site_addresses.retain(|a| a != &row.service_address);
            multi_site_addresses.insert(0, row.service_address.clone());
        }

        Ok(Contract {
            id: row.id,
            shareable_id: row.shareable_id,
            business_name: row.business_name,
            agent_business_name: row.agent_business_name,
            customer_email: row.customer_email,
            service_address: row.service_address,
            is_billing_same_as_service: row.is_billing_same_as_service,
            billing_address: row.billing_address,
            multi_site_addresses,
            installation_schedule_text: row.installation_schedule_text,
            status,
            created_at: row.created_at,
            admin_id: row.admin_id,
            selected_option_id: row.selected_option_id,
            signature,
            version: row.version,
        })
    }
}

#[derive(Debug, FromRow)]
struct OptionRow {
    id: Uuid,
    contract_id: Uuid,
    title: String,
    term_months: i32,
    line_items: Json<Value>,
    position: i32,
}

impl TryFrom<OptionRow> for ContractOption {
    type Error = AppError;

    fn try_from(row: OptionRow) -> Result<Self, Self::Error> {
        let Json(raw) = row.line_items;
        let raw: Vec<LineItemPayload> = serde_json::from_value(raw)
            .map_err(|e| AppError::MalformedDocument(format!("linhas da opção {}: {}", row.id, e)))?;

        // Os totais gravados são ignorados; sempre recalculados a partir das linhas.
        let line_items = pricing::normalize_line_items(&raw);
        let totals = pricing::compute_totals(&line_items);

        Ok(ContractOption {
            id: row.id,
            contract_id: row.contract_id,
            title: row.title,
            term_months: u32::try_from(row.term_months)
                .ok()
                .filter(|t| *t > 0)
                .unwrap_or(DEFAULT_TERM_MONTHS),
            total_mrc: totals.mrc,
            total_nrc: totals.nrc,
            line_items,
            position: row.position,
        })
    }
}

// =========================================================================
//  REPOSITÓRIO
// =========================================================================

#[derive(Clone)]
pub struct PgContractRepository {
    pool: PgPool,
}

impl PgContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_options(
        tx: &mut Transaction<'_, Postgres>,
        contract_id: Uuid,
        options: &[ContractOption],
    ) -> Result<(), AppError> {
        for option in options {
            sqlx::query(
                r#"
                INSERT INTO contract_options (
                    id, contract_id, title, term_months, total_mrc, total_nrc, line_items, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(option.id)
            .bind(contract_id)
            .bind(&option.title)
            .bind(i32::try_from(option.term_months).unwrap_or(i32::MAX))
            .bind(option.total_mrc)
            .bind(option.total_nrc)
            .bind(Json(&option.line_items))
            .bind(option.position)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

fn signature_json(contract: &Contract) -> Option<Json<&Signature>> {
    contract.signature.as_ref().map(Json)
}

#[async_trait]
impl ContractStore for PgContractRepository {
    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, AppError> {
        sqlx::query_as::<_, ContractRow>("SELECT * FROM contracts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Contract::try_from)
            .transpose()
    }

    async fn find_by_shareable_id(&self, shareable_id: &str) -> Result<Option<Contract>, AppError> {
        sqlx::query_as::<_, ContractRow>("SELECT * FROM contracts WHERE shareable_id = $1")
            .bind(shareable_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Contract::try_from)
            .transpose()
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, AppError> {
        sqlx::query_as::<_, ContractRow>("SELECT * FROM contracts ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Contract::try_from)
            .collect()
    }

    async fn insert_contract(&self, contract: &Contract, options: &[ContractOption]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO contracts (
                id, shareable_id, business_name, agent_business_name, customer_email,
                service_address, is_billing_same_as_service, billing_address,
                multi_site_addresses, installation_schedule_text, status, created_at,
                admin_id, selected_option_id, signature, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(contract.id)
        .bind(&contract.shareable_id)
        .bind(&contract.business_name)
        .bind(&contract.agent_business_name)
        .bind(&contract.customer_email)
        .bind(&contract.service_address)
        .bind(contract.is_billing_same_as_service)
        .bind(&contract.billing_address)
        .bind(&contract.multi_site_addresses)
        .bind(&contract.installation_schedule_text)
        .bind(contract.status.as_str())
        .bind(contract.created_at)
        .bind(&contract.admin_id)
        .bind(contract.selected_option_id)
        .bind(signature_json(contract))
        .bind(contract.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // Converte erro de violação de chave única em um erro mais amigável
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateShareableId(contract.shareable_id.clone());
                }
            }
            AppError::DatabaseError(e)
        })?;

        Self::insert_options(&mut tx, contract.id, options).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_draft(
        &self,
        contract: &Contract,
        expected_version: i64,
        options: Option<&[ContractOption]>,
    ) -> Result<bool, AppError> {
        // A condição e a troca de opções ficam na mesma transação: ou troca tudo, ou nada.
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE contracts
            SET business_name = $3,
                agent_business_name = $4,
                customer_email = $5,
                service_address = $6,
                is_billing_same_as_service = $7,
                billing_address = $8,
                multi_site_addresses = $9,
                installation_schedule_text = $10,
                status = $11,
                selected_option_id = $12,
                signature = $13,
                version = $14
            WHERE id = $1 AND version = $2 AND status = 'draft'
            "#,
        )
        .bind(contract.id)
        .bind(expected_version)
        .bind(&contract.business_name)
        .bind(&contract.agent_business_name)
        .bind(&contract.customer_email)
        .bind(&contract.service_address)
        .bind(contract.is_billing_same_as_service)
        .bind(&contract.billing_address)
        .bind(&contract.multi_site_addresses)
        .bind(&contract.installation_schedule_text)
        .bind(contract.status.as_str())
        .bind(contract.selected_option_id)
        .bind(signature_json(contract))
        .bind(contract.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(options) = options {
            sqlx::query("DELETE FROM contract_options WHERE contract_id = $1")
                .bind(contract.id)
                .execute(&mut *tx)
                .await?;

            Self::insert_options(&mut tx, contract.id, options).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn list_options(&self, contract_id: Uuid) -> Result<Vec<ContractOption>, AppError> {
        sqlx::query_as::<_, OptionRow>(
            "SELECT * FROM contract_options WHERE contract_id = $1 ORDER BY position ASC",
        )
        .bind(contract_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ContractOption::try_from)
        .collect()
    }

    async fn get_option(&self, contract_id: Uuid, option_id: Uuid) -> Result<Option<ContractOption>, AppError> {
        sqlx::query_as::<_, OptionRow>(
            "SELECT * FROM contract_options WHERE contract_id = $1 AND id = $2",
        )
        .bind(contract_id)
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await?
        .map(ContractOption::try_from)
        .transpose()
    }

    async fn delete_option(&self, contract_id: Uuid, option_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM contract_options WHERE contract_id = $1 AND id = $2")
            .bind(contract_id)
            .bind(option_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_contract(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM contracts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
