//! Download interception: serve the file, then count it.
//!
//! While counting is enabled the interceptor takes over the host's file
//! download routes, serves bytes through a [`FileServer`] and records the
//! download afterwards. A counting failure is logged and never turns a served
//! download into an error.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::catalog::Catalog;
use crate::settings::SettingsService;
use crate::stats::{StatisticsRepository, StatsError};

/// Host routes taken over while counting is enabled.
pub const INTERCEPTED_ROUTES: [&str; 2] = ["system.private_file_download", "system.files"];

/// Path segment inserted into private URIs of counted files.
pub const COUNTER_URI_SEGMENT: &str = "download-counter/";

/// Errors raised while serving file bytes.
#[derive(Debug, Error)]
pub enum ServeError {
    /// No file is registered under this id.
    #[error("file {0} not found")]
    NotFound(i64),

    /// The file exists but is not currently servable.
    #[error("file {0} is not available for download")]
    NotServable(i64),

    /// The stored URI cannot be mapped to a local path.
    #[error("unsupported file uri '{0}'")]
    InvalidUri(String),

    /// Reading the file failed.
    #[error("failed to read '{path}': {source}")]
    Io {
        /// Resolved local path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Looking up the file failed.
    #[error(transparent)]
    Storage(#[from] StatsError),
}

/// Bytes of a served file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedFile {
    /// Served resource.
    pub resource_id: i64,
    /// Display name.
    pub filename: String,
    /// File contents.
    pub body: Vec<u8>,
}

/// Produces file bytes for a resource id. This is the uninstrumented path.
#[async_trait]
pub trait FileServer: Send + Sync {
    /// Serves the file registered as `resource_id`.
    async fn serve(&self, resource_id: i64) -> Result<ServedFile, ServeError>;
}

/// Serves catalog files from a local directory tree.
///
/// `private://a/b.pdf` maps to `<root>/private/a/b.pdf` and `public://x` to
/// `<root>/public/x`.
#[derive(Debug, Clone)]
pub struct CatalogFileServer {
    catalog: Catalog,
    root: PathBuf,
}

impl CatalogFileServer {
    /// Creates a server reading files below `root`.
    #[must_use]
    pub fn new(catalog: Catalog, root: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            root: root.into(),
        }
    }

    /// Maps a stream URI to a path below this server's root.
    ///
    /// # Errors
    ///
    /// See [`resolve_uri`].
    pub fn resolve_path(&self, uri: &str) -> Result<PathBuf, ServeError> {
        resolve_uri(&self.root, uri)
    }
}

/// Maps a stream URI to a path below `root`.
///
/// The counter segment inserted by the URI formatter is ignored, so both
/// `private://a.pdf` and `private://download-counter/a.pdf` name the same file.
///
/// # Errors
///
/// Returns [`ServeError::InvalidUri`] for unknown schemes and for paths that
/// would escape the root.
pub fn resolve_uri(root: &Path, uri: &str) -> Result<PathBuf, ServeError> {
    let (scheme_dir, rest) = if let Some(rest) = uri.strip_prefix("private://") {
        ("private", rest.strip_prefix(COUNTER_URI_SEGMENT).unwrap_or(rest))
    } else if let Some(rest) = uri.strip_prefix("public://") {
        ("public", rest)
    } else {
        return Err(ServeError::InvalidUri(uri.to_string()));
    };

    let relative = Path::new(rest);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if rest.is_empty() || escapes {
        return Err(ServeError::InvalidUri(uri.to_string()));
    }

    Ok(root.join(scheme_dir).join(relative))
}

#[async_trait]
impl FileServer for CatalogFileServer {
    #[instrument(skip(self))]
    async fn serve(&self, resource_id: i64) -> Result<ServedFile, ServeError> {
        let file = self
            .catalog
            .get_file(resource_id)
            .await?
            .ok_or(ServeError::NotFound(resource_id))?;

        if !file.is_servable() {
            return Err(ServeError::NotServable(resource_id));
        }

        let path = self.resolve_path(&file.uri)?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|source| ServeError::Io { path, source })?;

        Ok(ServedFile {
            resource_id,
            filename: file.filename,
            body,
        })
    }
}

/// Result of an intercepted download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedDownload {
    /// The served file.
    pub file: ServedFile,
    /// Whether the download was counted.
    pub counted: bool,
}

/// Routes downloads through a counting step.
pub struct DownloadInterceptor {
    server: Arc<dyn FileServer>,
    statistics: Arc<dyn StatisticsRepository>,
    settings: SettingsService,
}

impl DownloadInterceptor {
    /// Creates an interceptor around the uninstrumented `server`.
    #[must_use]
    pub fn new(
        server: Arc<dyn FileServer>,
        statistics: Arc<dyn StatisticsRepository>,
        settings: SettingsService,
    ) -> Self {
        Self {
            server,
            statistics,
            settings,
        }
    }

    /// Whether the interceptor currently handles the named host route.
    #[must_use]
    pub fn takes_over_route(&self, route_name: &str) -> bool {
        self.settings.is_counting_enabled() && INTERCEPTED_ROUTES.contains(&route_name)
    }

    /// Serves `resource_id` to `user_id`, counting the download when enabled.
    ///
    /// # Errors
    ///
    /// Returns the [`ServeError`] of the underlying server. Counting failures
    /// are never returned.
    #[instrument(skip(self))]
    pub async fn download(
        &self,
        resource_id: i64,
        user_id: i64,
    ) -> Result<InterceptedDownload, ServeError> {
        let file = self.server.serve(resource_id).await?;

        if !self.settings.is_counting_enabled() {
            debug!(resource_id, "download counting disabled");
            return Ok(InterceptedDownload {
                file,
                counted: false,
            });
        }

        let counted = self.statistics.record_download(resource_id, user_id).await;
        if !counted {
            warn!(resource_id, user_id, "download served but not counted");
        }

        Ok(InterceptedDownload { file, counted })
    }
}
