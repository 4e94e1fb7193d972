//! Runtime override persistence.
//!
//! The override is a single JSON document next to the service's other
//! configuration. It is absent on a fresh install. Every read re-merges it
//! over the built-in defaults, so a save is visible to the very next
//! estimation call.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;
use crate::estimation::settings::{EstimatorConfig, RuntimeOverride};
use crate::validation::validate_override;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Provides the effective estimator configuration.
pub struct ConfigStore {
    base: EstimatorConfig,
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store over `base`, persisting overrides at `path`.
    pub fn new(base: EstimatorConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            base,
            path: path.into(),
        }
    }

    /// Location of the override document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted override. A missing or unreadable file is an
    /// empty override.
    pub async fn load_override(&self) -> RuntimeOverride {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return RuntimeOverride::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read estimator override, using defaults");
                return RuntimeOverride::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(overrides) => overrides,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to parse estimator override, using defaults");
                RuntimeOverride::default()
            }
        }
    }

    /// The effective configuration: base defaults with the current override
    /// applied. Re-read on every call.
    pub async fn current(&self) -> EstimatorConfig {
        let overrides = self.load_override().await;
        self.base.merge(&overrides)
    }

    /// Validate and persist `overrides`, replacing any previous override in
    /// full, and return the resulting effective configuration.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// readers never see a partial document. Concurrent saves are
    /// last-writer-wins.
    pub async fn save_override(
        &self,
        overrides: RuntimeOverride,
    ) -> Result<EstimatorConfig, StoreError> {
        let validation = validate_override(&self.base, &overrides);
        if !validation.is_valid {
            return Err(StoreError::Rejected {
                errors: validation.errors,
            });
        }
        for warning in &validation.warnings {
            tracing::warn!("Estimator override: {}", warning);
        }

        let content = serde_json::to_string_pretty(&overrides)?;
        self.write_atomic(content.as_bytes()).await?;

        tracing::info!(path = %self.path.display(), "Saved estimator override");

        Ok(self.current().await)
    }

    /// Delete the override, restoring the built-in defaults. Returns whether
    /// a file was removed.
    pub async fn reset(&self) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Removed estimator override");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn write_atomic(&self, content: &[u8]) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, content).await.map_err(write_err)?;

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        Ok(())
    }

    /// Unique per write so concurrent saves never share a temp file.
    fn tmp_path(&self) -> PathBuf {
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        PathBuf::from(name)
    }
}
