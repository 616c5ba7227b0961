//! Presentation adapters: formatters, the numeric count field and the
//! popular-downloads block.
//!
//! All adapters read the counting flag per call and render nothing
//! counter-related while it is off.

use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::catalog::ManagedFile;
use crate::interceptor::COUNTER_URI_SEGMENT;
use crate::permissions::AccessPolicy;
use crate::settings::SettingsService;
use crate::stats::{FilenameEntry, OrderField, Result, StatisticsRepository};

/// A rendered file link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileLink {
    /// Linked file.
    pub fid: i64,
    /// Link text.
    pub filename: String,
    /// Stream URI of the file.
    pub uri: String,
    /// Whether downloads through this link are counted.
    pub count_downloads: bool,
}

/// Generic file link formatter that flags links for counting.
#[derive(Debug, Clone)]
pub struct FileFormatter {
    settings: SettingsService,
}

impl FileFormatter {
    /// Creates a formatter reading the counting flag from `settings`.
    #[must_use]
    pub fn new(settings: SettingsService) -> Self {
        Self { settings }
    }

    /// Only offered for fields referencing files, and only while counting.
    #[must_use]
    pub fn is_applicable(&self, target_type: &str) -> bool {
        self.settings.is_counting_enabled() && target_type == "file"
    }

    /// Renders one link per file, flagged for counting while enabled.
    #[must_use]
    pub fn view_elements(&self, files: &[ManagedFile]) -> Vec<FileLink> {
        let count_downloads = self.settings.is_counting_enabled();
        files
            .iter()
            .map(|file| FileLink {
                fid: file.fid,
                filename: file.filename.clone(),
                uri: file.uri.clone(),
                count_downloads,
            })
            .collect()
    }
}

/// File URI formatter that routes private files through the counter path.
#[derive(Debug, Clone)]
pub struct FileUriFormatter {
    settings: SettingsService,
    /// When set, URIs are rendered as absolute URLs under this base.
    pub base_url: Option<String>,
}

impl FileUriFormatter {
    /// Creates a formatter; `base_url` turns URIs into absolute URLs.
    #[must_use]
    pub fn new(settings: SettingsService, base_url: Option<String>) -> Self {
        Self { settings, base_url }
    }

    /// Only offered for the `uri` field, and only while counting.
    #[must_use]
    pub fn is_applicable(&self, field_name: &str) -> bool {
        self.settings.is_counting_enabled() && field_name == "uri"
    }

    /// Renders a stream URI.
    #[must_use]
    pub fn view_value(&self, uri: &str) -> String {
        let value = if self.settings.is_counting_enabled() {
            counter_uri(uri)
        } else {
            uri.to_string()
        };

        match &self.base_url {
            Some(base) => file_url(base, &value),
            None => value,
        }
    }
}

/// Inserts the counter segment into a private URI; other URIs are unchanged.
#[must_use]
pub fn counter_uri(uri: &str) -> String {
    match uri.strip_prefix("private://") {
        Some(rest) if !rest.starts_with(COUNTER_URI_SEGMENT) => {
            format!("private://{COUNTER_URI_SEGMENT}{rest}")
        }
        _ => uri.to_string(),
    }
}

/// Converts a stream URI to a URL under `base`.
#[must_use]
pub fn file_url(base: &str, uri: &str) -> String {
    let base = base.trim_end_matches('/');
    if let Some(rest) = uri.strip_prefix("private://") {
        format!("{base}/system/files/{rest}")
    } else if let Some(rest) = uri.strip_prefix("public://") {
        format!("{base}/files/{rest}")
    } else {
        uri.to_string()
    }
}

/// Numeric listing field showing a resource's download count.
pub struct DownloadCountField {
    statistics: Arc<dyn StatisticsRepository>,
    access: Arc<dyn AccessPolicy>,
    settings: SettingsService,
    /// Counter shown by this field.
    pub field: OrderField,
}

impl DownloadCountField {
    /// Creates a field showing `field` for each listed resource.
    #[must_use]
    pub fn new(
        statistics: Arc<dyn StatisticsRepository>,
        access: Arc<dyn AccessPolicy>,
        settings: SettingsService,
        field: OrderField,
    ) -> Self {
        Self {
            statistics,
            access,
            settings,
            field,
        }
    }

    /// Whether `user_id` may see this field.
    #[must_use]
    pub fn access(&self, user_id: i64) -> bool {
        self.access.can_view_statistics(user_id)
    }

    /// Renders the counter values for several resources, in input order.
    ///
    /// Resources never downloaded show 0. Returns `None` when counting is off
    /// or the viewer lacks access.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if the lookup fails.
    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    pub async fn render(&self, viewer: i64, ids: &[i64]) -> Result<Option<Vec<i64>>> {
        if !self.settings.is_counting_enabled() || !self.access(viewer) {
            return Ok(None);
        }

        let records = self.statistics.fetch_downloads(ids).await?;
        Ok(Some(
            ids.iter()
                .map(|id| records.get(id).map_or(0, |r| r.value_of(self.field)))
                .collect(),
        ))
    }
}

/// Popular downloads block configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularBlockConfig {
    /// Number of all-time entries (0 hides the section).
    pub top_all: u32,
    /// Number of today's entries (0 hides the section).
    pub top_day: u32,
    /// Number of most recent entries (0 hides the section).
    pub top_last: u32,
}

impl Default for PopularBlockConfig {
    fn default() -> Self {
        Self {
            top_all: 5,
            top_day: 5,
            top_last: 5,
        }
    }
}

/// One titled list of the popular downloads block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularSection {
    /// Section heading.
    pub title: &'static str,
    /// Counter the section ranks by.
    pub order: OrderField,
    /// Ranked entries.
    pub entries: Vec<FilenameEntry>,
}

/// Block listing the most downloaded files.
pub struct PopularDownloadsBlock {
    statistics: Arc<dyn StatisticsRepository>,
    access: Arc<dyn AccessPolicy>,
    settings: SettingsService,
    config: PopularBlockConfig,
}

impl PopularDownloadsBlock {
    /// Creates the block with per-section limits from `config`.
    #[must_use]
    pub fn new(
        statistics: Arc<dyn StatisticsRepository>,
        access: Arc<dyn AccessPolicy>,
        settings: SettingsService,
        config: PopularBlockConfig,
    ) -> Self {
        Self {
            statistics,
            access,
            settings,
            config,
        }
    }

    /// Builds the block for `viewer`.
    ///
    /// Returns `None` when counting is off or the viewer may not see
    /// statistics. Empty sections are left out.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatsError::Storage`] if a listing query fails.
    #[instrument(skip(self))]
    pub async fn build(&self, viewer: i64) -> Result<Option<Vec<PopularSection>>> {
        if !self.settings.is_counting_enabled() || !self.access.can_view_statistics(viewer) {
            return Ok(None);
        }

        let wanted = [
            ("All time", OrderField::TotalCount, self.config.top_all),
            ("Today", OrderField::DayCount, self.config.top_day),
            ("Last downloaded", OrderField::LastTimestamp, self.config.top_last),
        ];

        let mut sections = Vec::new();
        for (title, order, limit) in wanted {
            if limit == 0 {
                continue;
            }
            let entries = self.statistics.filename_list(order, limit).await?;
            if !entries.is_empty() {
                sections.push(PopularSection {
                    title,
                    order,
                    entries,
                });
            }
        }

        Ok(Some(sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_uri_rewrites_private_only() {
        assert_eq!(
            counter_uri("private://docs/a.pdf"),
            "private://download-counter/docs/a.pdf"
        );
        assert_eq!(counter_uri("public://a.png"), "public://a.png");
    }

    #[test]
    fn test_counter_uri_is_idempotent() {
        let once = counter_uri("private://a.pdf");
        assert_eq!(counter_uri(&once), once);
    }

    #[test]
    fn test_file_url_maps_schemes() {
        assert_eq!(
            file_url("https://example.org/", "private://download-counter/a.pdf"),
            "https://example.org/system/files/download-counter/a.pdf"
        );
        assert_eq!(
            file_url("https://example.org", "public://logo.png"),
            "https://example.org/files/logo.png"
        );
        assert_eq!(file_url("https://example.org", "ftp://x"), "ftp://x");
    }
}
