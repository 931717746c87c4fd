// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    common::i18n::I18nStore,
    db::{ContractRepository, ContractStore, InMemoryContractStore, LocalObjectStore, ObjectStore},
    services::{
        auth::AuthService, contract_service::ContractService, document_service::DocumentService,
        feed::ContractFeed,
    },
};

// Limite padrão do upload de PDF (10 MiB)
const DEFAULT_MAX_PDF_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // Sem DATABASE_URL o servidor roda com armazenamento em memória
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    // Base dos links públicos (assinatura e download de arquivos)
    pub public_base_url: String,
    pub sign_prefix: String,
    pub storage_dir: PathBuf,
    pub fonts_dir: PathBuf,
    pub max_pdf_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let max_pdf_bytes = match env::var("MAX_PDF_BYTES") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("MAX_PDF_BYTES inválido: {raw}"))?,
            Err(_) => DEFAULT_MAX_PDF_BYTES,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            jwt_secret,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            sign_prefix: env::var("SIGN_PREFIX").unwrap_or_else(|_| "assinar".to_string()),
            storage_dir: env::var("STORAGE_DIR")
                .unwrap_or_else(|_| "./storage".to_string())
                .into(),
            fonts_dir: env::var("FONTS_DIR")
                .unwrap_or_else(|_| "./fonts".to_string())
                .into(),
            max_pdf_bytes,
        })
    }

    /// Prefixo da rota pública de assinatura, sem barras.
    pub fn sign_prefix(&self) -> &str {
        self.sign_prefix.trim_matches('/')
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub contract_service: ContractService,
    pub auth_service: AuthService,
    pub document_service: DocumentService,
    pub object_store: Arc<dyn ObjectStore>,
    pub i18n_store: Arc<I18nStore>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn ContractStore> = match &config.database_url {
            Some(database_url) => {
                // Conecta ao banco de dados, usando '?' para propagar erros
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await
                    .context("Falha ao conectar no banco de dados")?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                sqlx::migrate!()
                    .run(&db_pool)
                    .await
                    .context("Falha ao rodar as migrações do banco de dados")?;
                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

                Arc::new(ContractRepository::new(db_pool))
            }
            None => {
                tracing::warn!("DATABASE_URL não definida: usando armazenamento em memória");
                Arc::new(InMemoryContractStore::new())
            }
        };

        let objects: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
            config.storage_dir.clone(),
            config.public_base_url.clone(),
        ));

        Self::with_stores(config, store, objects)
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_stores(
        config: Config,
        store: Arc<dyn ContractStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> anyhow::Result<Self> {
        let i18n_store = Arc::new(I18nStore::bundled()?);
        let auth_service = AuthService::new(config.jwt_secret.clone());
        let document_service = DocumentService::new(config.fonts_dir.clone());
        let contract_service = ContractService::new(
            store,
            objects.clone(),
            ContractFeed::new(),
            &config.public_base_url,
            config.sign_prefix(),
        );

        Ok(Self {
            config: Arc::new(config),
            contract_service,
            auth_service,
            document_service,
            object_store: objects,
            i18n_store,
        })
    }
}
