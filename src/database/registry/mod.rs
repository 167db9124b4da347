// Backend registry
// Owns the single active session per backend plus the upload scratch directory


use crate::config::Config;
use crate::database::analytical::AnalyticalStoreSession;
use crate::database::models::{ConnectSummary, HealthStatus, UploadSummary, VectorEndpoint};
use crate::database::scratch::ScratchDir;
use crate::database::vector::VectorStoreSession;
use crate::ScopeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Common lifecycle for backend sessions held by the registry
#[async_trait]
pub trait BackendSession: Send + Sync {
    /// Human-readable description of what the session is attached to
    fn label(&self) -> String;

    /// Release the session's backend resources
    async fn close(&self) -> Result<(), ScopeError>;
}

#[async_trait]
impl BackendSession for VectorStoreSession {
    #[inline]
    fn label(&self) -> String {
        format!("vector store at {}", self.endpoint())
    }

    #[inline]
    async fn close(&self) -> Result<(), ScopeError> {
        self.disconnect().await;
        Ok(())
    }
}

#[async_trait]
impl BackendSession for AnalyticalStoreSession {
    #[inline]
    fn label(&self) -> String {
        format!("database file {}", self.path().display())
    }

    #[inline]
    async fn close(&self) -> Result<(), ScopeError> {
        AnalyticalStoreSession::close(self).await;
        Ok(())
    }
}

/// Close a replaced session, logging instead of failing
async fn retire<S: BackendSession + ?Sized>(session: &S) {
    if let Err(e) = session.close().await {
        warn!("Failed to close {}: {}", session.label(), e);
    }
}

/// Holds at most one vector store session and one analytical session
pub struct BackendRegistry {
    config: Config,
    vector: Mutex<Option<Arc<VectorStoreSession>>>,
    analytical: Mutex<Option<Arc<AnalyticalStoreSession>>>,
    scratch: Mutex<ScratchDir>,
    started_at: DateTime<Utc>,
}

impl BackendRegistry {
    /// Create an empty registry and its scratch directory
    #[inline]
    pub fn new(config: Config) -> Result<Self, ScopeError> {
        let scratch = ScratchDir::new(config.server.scratch_dir.as_deref())?;

        Ok(Self {
            config,
            vector: Mutex::new(None),
            analytical: Mutex::new(None),
            scratch: Mutex::new(scratch),
            started_at: Utc::now(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connect to a vector store, replacing any current session
    ///
    /// The previous session is disconnected before the new connection is
    /// attempted, so a failed connect leaves the registry disconnected.
    #[inline]
    pub async fn connect_vector(
        &self,
        endpoint: VectorEndpoint,
    ) -> Result<ConnectSummary, ScopeError> {
        let mut slot = self.vector.lock().await;
        if let Some(previous) = slot.take() {
            debug!("Replacing {}", previous.label());
            retire(previous.as_ref()).await;
        }

        let (session, collections_count) =
            VectorStoreSession::connect(endpoint, &self.config.vector).await?;
        let summary = ConnectSummary::new(session.endpoint(), collections_count);
        *slot = Some(Arc::new(session));

        Ok(summary)
    }

    /// Disconnect the current vector store session, if any
    ///
    /// # Returns
    /// * `bool` - Whether a session was disconnected
    #[inline]
    pub async fn disconnect_vector(&self) -> bool {
        let previous = self.vector.lock().await.take();
        match previous {
            Some(session) => {
                retire(session.as_ref()).await;
                true
            }
            None => false,
        }
    }

    /// The active vector store session
    #[inline]
    pub async fn vector(&self) -> Result<Arc<VectorStoreSession>, ScopeError> {
        self.vector
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(ScopeError::NotConnected)
    }

    /// Open a database file in place, replacing any current session
    ///
    /// The new file is opened first; the previous session is only closed once
    /// the replacement is in the slot.
    #[inline]
    pub async fn open_database(&self, path: &Path) -> Result<usize, ScopeError> {
        let (session, tables_count) =
            AnalyticalStoreSession::open(path, &self.config.analytical).await?;

        let previous = self.analytical.lock().await.replace(Arc::new(session));
        if let Some(previous) = previous {
            debug!("Replacing {}", previous.label());
            retire(previous.as_ref()).await;
        }

        Ok(tables_count)
    }

    /// Copy an uploaded database image into the scratch directory and open it
    #[inline]
    pub async fn upload_database(
        &self,
        source: &Path,
        file_name: &str,
    ) -> Result<UploadSummary, ScopeError> {
        let stored = self
            .scratch
            .lock()
            .await
            .store_upload(source, file_name, &self.config.analytical)?;

        let tables_count = match self.open_database(&stored.path).await {
            Ok(count) => count,
            Err(e) => {
                if let Some(dir) = stored.path.parent() {
                    if let Err(remove_err) = std::fs::remove_dir_all(dir) {
                        warn!(
                            "Failed to remove rejected upload {}: {}",
                            dir.display(),
                            remove_err
                        );
                    }
                }
                return Err(e);
            }
        };

        Ok(UploadSummary {
            status: "success".to_string(),
            message: format!("Database file {} uploaded successfully", stored.file_name),
            filename: stored.file_name,
            file_size: stored.file_size,
            tables_count,
        })
    }

    /// The active analytical session
    #[inline]
    pub async fn analytical(&self) -> Result<Arc<AnalyticalStoreSession>, ScopeError> {
        self.analytical
            .lock()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(ScopeError::NoFileLoaded)
    }

    #[inline]
    pub async fn health(&self) -> HealthStatus {
        let vector = self.vector.lock().await.clone();
        let (vector_connected, vector_endpoint, vector_connected_at) = match vector {
            Some(session) if session.is_connected().await => (
                true,
                Some(session.endpoint().to_string()),
                Some(session.connected_at()),
            ),
            _ => (false, None, None),
        };

        let analytical = self.analytical.lock().await.clone();
        let (database_loaded, database_path, database_opened_at) = match analytical {
            Some(session) if session.is_open() => (
                true,
                Some(session.path().to_path_buf()),
                Some(session.opened_at()),
            ),
            _ => (false, None, None),
        };
        let scratch_dir = self.scratch.lock().await.path().to_path_buf();

        HealthStatus {
            status: "healthy".to_string(),
            vector_connected,
            vector_endpoint,
            vector_connected_at,
            database_loaded,
            database_path,
            database_opened_at,
            scratch_dir,
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
        }
    }

    /// Close both sessions and remove the scratch directory
    #[inline]
    pub async fn shutdown(&self) -> Result<(), ScopeError> {
        info!("Shutting down backend registry");

        let vector = self.vector.lock().await.take();
        if let Some(session) = vector {
            retire(session.as_ref()).await;
        }

        let analytical = self.analytical.lock().await.take();
        if let Some(session) = analytical {
            retire(session.as_ref()).await;
        }

        self.scratch.lock().await.cleanup()
    }
}
