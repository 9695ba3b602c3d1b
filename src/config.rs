// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::clock::{Clock, FixedClock, SystemClock},
    db::{ClientRepository, CollectionRepository, LoanRepository},
    services::{
        collection_sync::CollectionSyncService, ledger_service::LedgerService,
        loan_service::LoanService, payment_service::PaymentService,
    },
};

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub utc_offset_hours: i32,
    /// Data fixa para "hoje" (homologação). Sem ela, vale o relógio do sistema.
    pub fixed_today: Option<NaiveDate>,
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválida: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?;
        let utc_offset_hours = parse_var("LEDGER_UTC_OFFSET_HOURS", -3i32)?;

        let fixed_today = match env::var("LEDGER_TODAY") {
            Ok(raw) => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .with_context(|| format!("LEDGER_TODAY inválida: '{}'", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            utc_offset_hours,
            fixed_today,
        })
    }

    pub fn clock(&self) -> anyhow::Result<Arc<dyn Clock>> {
        if let Some(date) = self.fixed_today {
            tracing::warn!("Relógio fixo em {} (LEDGER_TODAY)", date);
            return Ok(Arc::new(FixedClock(date)));
        }
        let clock = SystemClock::with_offset_hours(self.utc_offset_hours)
            .with_context(|| format!("LEDGER_UTC_OFFSET_HOURS fora do intervalo: {}", self.utc_offset_hours))?;
        Ok(Arc::new(clock))
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub clock: Arc<dyn Clock>,
    pub loan_service: LoanService,
    pub payment_service: PaymentService,
    pub collection_service: CollectionSyncService,
    pub ledger_service: LedgerService,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(db_pool, config.clock()?))
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_pool(db_pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        let loans = LoanRepository::new();
        let collections = CollectionRepository::new();
        let clients = ClientRepository::new();

        let collection_service = CollectionSyncService::new(loans.clone(), collections.clone());
        let loan_service = LoanService::new(
            loans.clone(),
            collections.clone(),
            clients,
            collection_service.clone(),
        );
        let payment_service = PaymentService::new(loans.clone(), collections.clone());
        let ledger_service = LedgerService::new(loans, collections, collection_service.clone());

        Self {
            db_pool,
            clock,
            loan_service,
            payment_service,
            collection_service,
            ledger_service,
        }
    }
}
