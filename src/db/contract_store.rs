// src/db/contract_store.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::contract::{Contract, ContractOption},
};

/// Porta de acesso aos documentos `contracts` e à subcoleção `options` de cada contrato.
///
/// As implementações não aplicam regras de negócio além da escrita condicional de
/// `update_draft`; as invariantes ficam no `ContractService`.
#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn get_contract(&self, id: Uuid) -> Result<Option<Contract>, AppError>;

    async fn find_by_shareable_id(&self, shareable_id: &str) -> Result<Option<Contract>, AppError>;

    /// Mais recentes primeiro.
    async fn list_contracts(&self) -> Result<Vec<Contract>, AppError>;

    /// Grava o contrato e suas opções. Falha com `DuplicateShareableId` se o id público colidir.
    async fn insert_contract(&self, contract: &Contract, options: &[ContractOption]) -> Result<(), AppError>;

    /// Escrita condicional: só grava se o documento ainda estiver em `draft`
    /// e na versão `expected_version`. Retorna `false` quando a condição falha.
    ///
    /// Com `options`, o conjunto de opções é trocado na mesma escrita atômica:
    /// ou contrato e opções mudam juntos, ou nada muda.
    async fn update_draft(
        &self,
        contract: &Contract,
        expected_version: i64,
        options: Option<&[ContractOption]>,
    ) -> Result<bool, AppError>;

    /// Na ordem de `position`.
    async fn list_options(&self, contract_id: Uuid) -> Result<Vec<ContractOption>, AppError>;

    async fn get_option(&self, contract_id: Uuid, option_id: Uuid) -> Result<Option<ContractOption>, AppError>;

    async fn delete_option(&self, contract_id: Uuid, option_id: Uuid) -> Result<bool, AppError>;

    async fn delete_contract(&self, id: Uuid) -> Result<bool, AppError>;
}
