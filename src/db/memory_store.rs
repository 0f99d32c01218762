// src/db/memory_store.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::ContractStore,
    models::contract::{Contract, ContractOption, ContractStatus},
};

#[derive(Default)]
struct Collections {
    contracts: HashMap<Uuid, Contract>,
    // contract_id -> (option_id -> option)
    options: HashMap<Uuid, HashMap<Uuid, ContractOption>>,
}

/// Armazenamento em memória, usado quando não há `DATABASE_URL` e nos testes.
#[derive(Default)]
pub struct InMemoryContractStore {
    inner: RwLock<Collections>,
}

impl InMemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, AppError> {
        Ok(self.inner.read().await.contracts.get(&id).cloned())
    }

    async fn find_by_shareable_id(&self, shareable_id: &str) -> Result<Option<Contract>, AppError> {
        let guard = self.inner.read().await;
        Ok(guard
            .contracts
            .values()
            .find(|c| c.shareable_id == shareable_id)
            .cloned())
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, AppError> {
        let mut contracts: Vec<Contract> = self.inner.read().await.contracts.values().cloned().collect();
        contracts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contracts)
    }

    async fn insert_contract(&self, contract: &Contract, options: &[ContractOption]) -> Result<(), AppError> {
        let mut guard = self.inner.write().await;

        if guard.contracts.values().any(|c| c.shareable_id == contract.shareable_id) {
            return Err(AppError::DuplicateShareableId(contract.shareable_id.clone()));
        }
        if guard.contracts.contains_key(&contract.id) {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "contrato {} já existe",
                contract.id
            )));
        }

        guard.contracts.insert(contract.id, contract.clone());
        guard.options.insert(
            contract.id,
            options.iter().map(|o| (o.id, o.clone())).collect(),
        );
        Ok(())
    }

    async fn update_draft(
        &self,
        contract: &Contract,
        expected_version: i64,
        options: Option<&[ContractOption]>,
    ) -> Result<bool, AppError> {
        // Um único lock de escrita cobre a condição, o contrato e as opções.
        let mut guard = self.inner.write().await;
        match guard.contracts.get_mut(&contract.id) {
            Some(current)
                if current.status == ContractStatus::Draft && current.version == expected_version =>
            {
                *current = contract.clone();
            }
            _ => return Ok(false),
        }

        if let Some(options) = options {
            guard.options.insert(
                contract.id,
                options.iter().map(|o| (o.id, o.clone())).collect(),
            );
        }
        Ok(true)
    }

    async fn list_options(&self, contract_id: Uuid) -> Result<Vec<ContractOption>, AppError> {
        let guard = self.inner.read().await;
        let mut options: Vec<ContractOption> = guard
            .options
            .get(&contract_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default();
        options.sort_by_key(|o| o.position);
        Ok(options)
    }

    async fn get_option(&self, contract_id: Uuid, option_id: Uuid) -> Result<Option<ContractOption>, AppError> {
        let guard = self.inner.read().await;
        Ok(guard
            .options
            .get(&contract_id)
            .and_then(|set| set.get(&option_id))
            .cloned())
    }

    async fn delete_option(&self, contract_id: Uuid, option_id: Uuid) -> Result<bool, AppError> {
        let mut guard = self.inner.write().await;
        Ok(guard
            .options
            .get_mut(&contract_id)
            .and_then(|set| set.remove(&option_id))
            .is_some())
    }

    async fn delete_contract(&self, id: Uuid) -> Result<bool, AppError> {
        let mut guard = self.inner.write().await;
        // Mesmo comportamento da FK com RESTRICT no Postgres.
        if guard.options.get(&id).is_some_and(|set| !set.is_empty()) {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "contrato {} ainda possui opções",
                id
            )));
        }
        guard.options.remove(&id);
        Ok(guard.contracts.remove(&id).is_some())
    }
}
