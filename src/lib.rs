//! Download Counter Core Library
//!
//! This library counts file downloads and exposes the counts through admin
//! reports, a field formatter, a numeric display field and a block.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`stats`] - Counter persistence, ranking and the daily reset sweep
//! - [`state`] - Scalar persisted values (last reset time, feature flag)
//! - [`catalog`] - File metadata and account names joined into listings
//! - [`settings`] - Feature flag service and the admin settings form
//! - [`permissions`] - Permission predicates supplied by the host
//! - [`interceptor`] - Counting step around file downloads
//! - [`presentation`] - Formatters, count field and popular-downloads block
//! - [`report`] - Ranked admin report

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod clock;
pub mod db;
pub mod interceptor;
pub mod permissions;
pub mod presentation;
pub mod report;
pub mod settings;
pub mod state;
pub mod stats;

// Re-export commonly used types
pub use catalog::{Catalog, FileStatus, ManagedFile};
pub use clock::{Clock, ManualClock, SystemClock};
pub use db::{Database, DatabaseOptions, DbError};
pub use interceptor::{
    CatalogFileServer, DownloadInterceptor, FileServer, INTERCEPTED_ROUTES, InterceptedDownload,
    ServeError, ServedFile, resolve_uri,
};
pub use permissions::{AccessPolicy, AllowAll, Permission, StaticAccessPolicy};
pub use presentation::{
    DownloadCountField, FileFormatter, FileLink, FileUriFormatter, PopularBlockConfig,
    PopularDownloadsBlock, PopularSection, counter_uri, file_url,
};
pub use report::{DownloadReport, ReportRow};
pub use settings::{Settings, SettingsForm, SettingsOutcome, SettingsService, SettingsSubmission};
pub use state::StateStore;
pub use stats::{
    ANONYMOUS_USER_ID, CounterRecord, DAY_RESET_INTERVAL_SECS, FilenameEntry, OrderField,
    StatisticsRepository, StatisticsStore, StatsDbErrorKind, StatsError,
};
