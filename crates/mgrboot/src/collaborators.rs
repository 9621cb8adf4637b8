//! Filesystem-backed key store and context publisher

use async_trait::async_trait;
use mgrboot_core::{AgentContext, BootstrapError, ContextPublisher, KeyStore, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Stores agent keys as `<dir>/<name>.pem`, readable by the owner only
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.pem", name))
    }
}

fn key_store_error(path: &Path, err: std::io::Error) -> BootstrapError {
    BootstrapError::KeyStore(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl KeyStore for FileKeyStore {
    async fn store(&self, name: &str, private_key: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| key_store_error(&self.dir, e))?;

        let path = self.path_for(name);
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&path)
            .await
            .map_err(|e| key_store_error(&path, e))?;
        file.write_all(private_key.as_bytes())
            .await
            .map_err(|e| key_store_error(&path, e))?;
        file.flush().await.map_err(|e| key_store_error(&path, e))?;

        // mode() only applies on creation
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| key_store_error(&path, e))?;
        }

        Ok(path)
    }

    async fn locate(&self, name: &str) -> Result<Option<PathBuf>> {
        let path = self.path_for(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(key_store_error(&path, e)),
        }
    }
}

/// Writes the agent context as pretty JSON to a file, or stdout when no
/// path is configured
pub struct JsonFilePublisher {
    path: Option<PathBuf>,
}

impl JsonFilePublisher {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn destination(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string())
    }
}

#[async_trait]
impl ContextPublisher for JsonFilePublisher {
    async fn publish(&self, record: &AgentContext) -> Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| BootstrapError::Publish(e.to_string()))?;

        let Some(path) = &self.path else {
            println!("{}", json);
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BootstrapError::Publish(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(path, format!("{}\n", json))
            .await
            .map_err(|e| BootstrapError::Publish(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Agent context written to {}", path.display());
        Ok(())
    }
}
