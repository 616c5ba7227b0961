//! Feature flag service and the admin settings form.
//!
//! [`SettingsService`] is the shared, per-request readable source of the
//! "count downloads" flag. It keeps a cached copy and writes changes through to
//! the state table so they survive restarts. [`SettingsForm`] is the admin
//! surface: it toggles the flag and optionally purges every counter on save.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::permissions::{AccessPolicy, Permission};
use crate::state::{COUNT_DOWNLOADS_KEY, StateStore};
use crate::stats::{Result, StatisticsRepository, StatsError};

/// Runtime settings for download counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Whether downloads are counted and counters displayed.
    pub count_downloads: bool,
}

/// Shared access to [`Settings`].
///
/// Clones share the same cached value.
#[derive(Debug, Clone)]
pub struct SettingsService {
    state: StateStore,
    cached: Arc<RwLock<Settings>>,
}

impl SettingsService {
    /// Loads settings from the state table, falling back to `defaults` for
    /// values that were never persisted.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the state table cannot be read.
    #[instrument(skip(state))]
    pub async fn load(state: StateStore, defaults: Settings) -> Result<Self> {
        let count_downloads = state
            .get(COUNT_DOWNLOADS_KEY)
            .await?
            .map_or(defaults.count_downloads, |value| value != 0);

        Ok(Self {
            state,
            cached: Arc::new(RwLock::new(Settings { count_downloads })),
        })
    }

    /// Returns the current settings.
    #[must_use]
    pub fn current(&self) -> Settings {
        match self.cached.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Shorthand for `current().count_downloads`.
    #[must_use]
    pub fn is_counting_enabled(&self) -> bool {
        self.current().count_downloads
    }

    /// Persists and publishes new settings. Returns whether the flag changed.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::Storage`] if the write fails; the cached value is
    /// left untouched in that case.
    #[instrument(skip(self))]
    pub async fn update(&self, settings: Settings) -> Result<bool> {
        self.state
            .set(COUNT_DOWNLOADS_KEY, i64::from(settings.count_downloads))
            .await?;

        let mut guard = match self.cached.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let changed = guard.count_downloads != settings.count_downloads;
        *guard = settings;
        Ok(changed)
    }
}

/// Values submitted through the settings form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsSubmission {
    /// New value of the "count downloads" flag.
    pub count_downloads: bool,
    /// Delete all counters on save.
    pub delete_downloads: bool,
}

/// What a settings submission changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SettingsOutcome {
    /// Whether the counting flag flipped.
    pub flag_changed: bool,
    /// Counter rows deleted, when a purge was requested.
    pub purged: Option<u64>,
}

/// Admin settings controller.
pub struct SettingsForm {
    settings: SettingsService,
    statistics: Arc<dyn StatisticsRepository>,
    access: Arc<dyn AccessPolicy>,
}

impl SettingsForm {
    /// Creates the controller from its collaborators.
    #[must_use]
    pub fn new(
        settings: SettingsService,
        statistics: Arc<dyn StatisticsRepository>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            settings,
            statistics,
            access,
        }
    }

    /// Default form values: the current flag, with purge pre-selected.
    #[must_use]
    pub fn defaults(&self) -> SettingsSubmission {
        SettingsSubmission {
            count_downloads: self.settings.is_counting_enabled(),
            delete_downloads: true,
        }
    }

    /// Applies a submission made by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::AccessDenied`] when the user may not administer
    /// statistics, or [`StatsError::Storage`] when persisting or purging fails.
    #[instrument(skip(self))]
    pub async fn submit(
        &self,
        user_id: i64,
        submission: SettingsSubmission,
    ) -> Result<SettingsOutcome> {
        if !self.access.can_administer_statistics(user_id) {
            return Err(StatsError::AccessDenied {
                user_id,
                permission: Permission::AdministerStatistics,
            });
        }

        let flag_changed = self
            .settings
            .update(Settings {
                count_downloads: submission.count_downloads,
            })
            .await?;

        let purged = if submission.delete_downloads {
            Some(self.statistics.delete_all_downloads().await?)
        } else {
            None
        };

        info!(
            count_downloads = submission.count_downloads,
            flag_changed,
            ?purged,
            "saved download statistics settings"
        );

        Ok(SettingsOutcome {
            flag_changed,
            purged,
        })
    }
}
