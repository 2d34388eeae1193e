// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

use crate::{
    db::{AccountRepository, DashboardRepository, MaterialPaymentRepository, TreasuryRepository, UserRepository},
    services::{
        auth::AuthService, dashboard_service::DashboardService, document_service::DocumentService,
        material_payment_service::MaterialPaymentService, treasury_service::TreasuryService,
    },
};

// Configuração lida do ambiente (.env é opcional)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub fonts_dir: String,
    pub company_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {}", raw))?,
            Err(_) => 5,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            db_max_connections,
            fonts_dir: env::var("FONTS_DIR").unwrap_or_else(|_| "./fonts".to_string()),
            company_name: env::var("COMPANY_NAME").unwrap_or_else(|_| "Constructora".to_string()),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub treasury_service: TreasuryService,
    pub material_payment_service: MaterialPaymentService,
    pub dashboard_service: DashboardService,
    pub document_service: DocumentService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let treasury_repo = TreasuryRepository::new(db_pool.clone());
        let account_repo = AccountRepository::new(db_pool.clone());
        let material_payment_repo = MaterialPaymentRepository::new(db_pool.clone());
        let dashboard_repo = DashboardRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo, config.jwt_secret.clone());
        let treasury_service = TreasuryService::new(treasury_repo.clone(), account_repo.clone());
        let material_payment_service =
            MaterialPaymentService::new(material_payment_repo, treasury_repo.clone(), account_repo.clone());
        let dashboard_service = DashboardService::new(dashboard_repo);
        let document_service = DocumentService::new(
            treasury_repo,
            account_repo,
            config.fonts_dir.clone(),
            config.company_name.clone(),
        );

        Ok(Self {
            db_pool,
            auth_service,
            treasury_service,
            material_payment_service,
            dashboard_service,
            document_service,
        })
    }
}
