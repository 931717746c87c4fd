// src/db/object_store.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::common::error::AppError;

/// Armazenamento de arquivos (PDFs dos contratos).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Grava o arquivo e devolve a URL pública de download.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, AppError>;

    async fn download(&self, path: &str) -> Result<Vec<u8>, AppError>;
}

// Implementação em disco local, servida pela rota /files
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    // Só aceita caminhos relativos simples (sem "..", sem raiz absoluta)
    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(AppError::InvalidStoragePath);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, AppError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;

        tracing::info!(path, size = bytes.len(), "Arquivo armazenado");
        Ok(format!("{}/files/{}", self.public_base_url, path))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, AppError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::FileNotFound),
            Err(e) => Err(e.into()),
        }
    }
}
