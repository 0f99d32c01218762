// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{ContractStore, InMemoryContractStore, PgContractRepository},
    services::{
        auth::AuthService,
        contract_service::ContractService,
        notification_service::{
            DisabledEmailRelay, EmailRelay, HttpEmailRelay, NotificationService, NotificationSettings,
        },
    },
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

// Configuração lida do ambiente (.env é carregado antes)
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub store_timeout: Duration,
    pub email_relay_url: Option<String>,
    pub admin_recipient: String,
    pub view_base_url: String,
    pub company_name: String,
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = optional("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let store_timeout_secs = match optional("STORE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("STORE_TIMEOUT_SECS inválido: {raw}"))?,
            None => DEFAULT_STORE_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            jwt_secret,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            store_timeout: Duration::from_secs(store_timeout_secs.max(1)),
            email_relay_url: optional("EMAIL_RELAY_URL"),
            admin_recipient: optional("ADMIN_RECIPIENT").unwrap_or_default(),
            view_base_url: optional("VIEW_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000/view.html".to_string()),
            company_name: optional("COMPANY_NAME").unwrap_or_else(|| "Community Fiber Network".to_string()),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: Option<PgPool>,
    pub settings: Settings,
    pub auth_service: AuthService,
    pub contract_service: ContractService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        // --- Armazenamento ---
        let (db_pool, store): (Option<PgPool>, Arc<dyn ContractStore>) = match &settings.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(url)
                    .await
                    .context("falha ao conectar no banco de dados")?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
                (Some(pool.clone()), Arc::new(PgContractRepository::new(pool)))
            }
            None => {
                tracing::warn!("DATABASE_URL ausente; usando armazenamento em memória (dados não persistem)");
                (None, Arc::new(InMemoryContractStore::new()))
            }
        };

        // --- Relay de e-mail ---
        let relay: Arc<dyn EmailRelay> = match &settings.email_relay_url {
            Some(url) => Arc::new(HttpEmailRelay::new(url.clone(), Duration::from_secs(10))?),
            None => {
                tracing::warn!("EMAIL_RELAY_URL ausente; e-mails de confirmação serão reportados como falha");
                Arc::new(DisabledEmailRelay)
            }
        };

        Ok(Self::assemble(settings, db_pool, store, relay))
    }

    /// Monta o gráfico de dependências a partir dos backends já escolhidos.
    pub fn assemble(
        settings: Settings,
        db_pool: Option<PgPool>,
        store: Arc<dyn ContractStore>,
        relay: Arc<dyn EmailRelay>,
    ) -> Self {
        let auth_service = AuthService::new(settings.jwt_secret.clone());
        let contract_service = ContractService::new(store, settings.store_timeout);
        let notification_service = NotificationService::new(
            relay,
            contract_service.clone(),
            NotificationSettings {
                admin_recipient: settings.admin_recipient.clone(),
                company_name: settings.company_name.clone(),
                view_base_url: settings.view_base_url.clone(),
            },
        );

        Self {
            db_pool,
            settings,
            auth_service,
            contract_service,
            notification_service,
        }
    }
}
