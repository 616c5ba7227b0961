//! CLI entry point for the download counter.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use download_counter_core::{
    AllowAll, Catalog, CatalogFileServer, Database, DownloadInterceptor, DownloadReport,
    FileStatus, ManagedFile, OrderField, PopularBlockConfig, PopularDownloadsBlock, ServeError,
    Settings, SettingsForm, SettingsService, SettingsSubmission, StateStore, StatisticsStore,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{DEFAULT_DB_PATH, DEFAULT_LIMIT, FileConfig, load_file_config_or_default};
use cli::{Args, Command};

/// User id the local operator acts as for admin-only actions.
const OPERATOR_USER_ID: i64 = 1;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = load_file_config_or_default(args.config.as_deref())?;
    let db_path = args
        .db
        .clone()
        .or_else(|| file_config.db_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

    let db = Database::new_with_options(&db_path, file_config.db_options())
        .await
        .with_context(|| format!("Failed to open statistics database '{}'", db_path.display()))?;

    let app = App::new(db, &file_config).await?;
    let result = app.run(args.command).await;
    app.db.close().await;
    result
}

struct App {
    db: Database,
    store: StatisticsStore,
    catalog: Catalog,
    settings: SettingsService,
    default_limit: u32,
    files_root: Option<PathBuf>,
}

impl App {
    async fn new(db: Database, file_config: &FileConfig) -> Result<Self> {
        let defaults = Settings {
            count_downloads: file_config.count_downloads.unwrap_or(false),
        };
        let settings = SettingsService::load(StateStore::new(db.clone()), defaults)
            .await
            .context("Failed to load counter settings")?;

        Ok(Self {
            store: StatisticsStore::new(db.clone()),
            catalog: Catalog::new(db.clone()),
            db,
            settings,
            default_limit: file_config.default_limit.unwrap_or(DEFAULT_LIMIT),
            files_root: file_config.files_root.clone(),
        })
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Record { resource_id, user } => {
                if !self.settings.is_counting_enabled() {
                    warn!("download counting is disabled; recording anyway");
                }
                if self.store.record_download(resource_id, user).await {
                    info!(resource_id, user, "download recorded");
                } else {
                    bail!("Failed to record download of resource {resource_id}");
                }
            }
            Command::Show { resource_ids, json } => {
                let records = self.store.fetch_downloads(&resource_ids).await?;
                if json {
                    let ordered: BTreeMap<_, _> = records.into_iter().collect();
                    println!("{}", serde_json::to_string_pretty(&ordered)?);
                } else {
                    for id in &resource_ids {
                        match records.get(id) {
                            Some(r) => println!(
                                "{id}\ttotal={}\ttoday={}\tlast={}\tuser={}",
                                r.total_count, r.day_count, r.last_timestamp, r.last_user_id
                            ),
                            None => println!("{id}\tno downloads"),
                        }
                    }
                }
            }
            Command::Top { order, limit } => {
                let ids = self
                    .store
                    .fetch_all(OrderField::from(order), limit.unwrap_or(self.default_limit))
                    .await?;
                for id in ids {
                    println!("{id}");
                }
            }
            Command::Report { order, limit, json } => {
                let report = DownloadReport::build(
                    &self.store,
                    &self.catalog,
                    OrderField::from(order),
                    limit.unwrap_or(self.default_limit),
                )
                .await
                .context("Failed to build download report")?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print!("{}", report.to_table());
                }
            }
            Command::Popular { limit } => {
                let block = PopularDownloadsBlock::new(
                    Arc::new(self.store.clone()),
                    Arc::new(AllowAll),
                    self.settings.clone(),
                    PopularBlockConfig {
                        top_all: limit,
                        top_day: limit,
                        top_last: limit,
                    },
                );
                match block.build(OPERATOR_USER_ID).await? {
                    None => println!("Download counting is disabled."),
                    Some(sections) => {
                        for section in sections {
                            println!("{}", section.title);
                            for entry in section.entries {
                                println!("  {}\t{}\t{}", entry.resource_id, entry.filename, entry.username);
                            }
                        }
                    }
                }
            }
            Command::Delete { resource_id } => {
                if self.store.delete_downloads(resource_id).await? {
                    info!(resource_id, "counters deleted");
                } else {
                    info!(resource_id, "no counters to delete");
                }
            }
            Command::Purge => {
                let deleted = self.store.delete_all_downloads().await?;
                println!("{deleted}");
            }
            Command::Cron => {
                if self.store.reset_day_count().await? {
                    info!("daily counters reset");
                } else {
                    info!("daily reset not due");
                }
            }
            Command::Max => {
                println!("{}", self.store.max_total_count().await?);
            }
            Command::Settings {
                enable,
                disable,
                purge,
            } => self.run_settings(enable, disable, purge).await?,
            Command::RegisterFile {
                fid,
                filename,
                uri,
                temporary,
            } => {
                let status = if temporary {
                    FileStatus::Temporary
                } else {
                    FileStatus::Permanent
                };
                let file = ManagedFile::new(fid, filename, uri).with_status(status);
                self.catalog.register_file(&file).await?;
                info!(fid, %status, "file registered");
            }
            Command::RemoveFile { fid } => {
                if !self.catalog.remove_file(fid).await? {
                    warn!(fid, "file was not registered");
                }
            }
            Command::RegisterUser { uid, name } => {
                self.catalog.register_account(uid, &name).await?;
                info!(uid, name = %name, "user registered");
            }
            Command::Fetch {
                fid,
                user,
                files_root,
                output,
            } => self.run_fetch(fid, user, files_root, output).await?,
        }
        Ok(())
    }

    async fn run_settings(&self, enable: bool, disable: bool, purge: bool) -> Result<()> {
        if !enable && !disable && !purge {
            println!(
                "count_downloads = {}",
                self.settings.is_counting_enabled()
            );
            return Ok(());
        }

        let form = SettingsForm::new(
            self.settings.clone(),
            Arc::new(self.store.clone()),
            Arc::new(AllowAll),
        );
        let count_downloads = if enable {
            true
        } else if disable {
            false
        } else {
            self.settings.is_counting_enabled()
        };

        let outcome = form
            .submit(
                OPERATOR_USER_ID,
                SettingsSubmission {
                    count_downloads,
                    delete_downloads: purge,
                },
            )
            .await?;

        println!("count_downloads = {count_downloads}");
        if let Some(purged) = outcome.purged {
            println!("purged = {purged}");
        }
        Ok(())
    }

    async fn run_fetch(
        &self,
        fid: i64,
        user: i64,
        files_root: Option<PathBuf>,
        output: Option<PathBuf>,
    ) -> Result<()> {
        let Some(root) = files_root.or_else(|| self.files_root.clone()) else {
            bail!("No files root configured; pass --files-root or set `files_root` in the config file");
        };

        let interceptor = DownloadInterceptor::new(
            Arc::new(CatalogFileServer::new(self.catalog.clone(), root)),
            Arc::new(self.store.clone()),
            self.settings.clone(),
        );

        let download = match interceptor.download(fid, user).await {
            Ok(download) => download,
            Err(ServeError::NotFound(_) | ServeError::NotServable(_)) => {
                bail!("File {fid} is not available for download")
            }
            Err(err) => return Err(err).context("Failed to serve file"),
        };

        match output {
            Some(path) => tokio::fs::write(&path, &download.file.body)
                .await
                .with_context(|| format!("Failed to write '{}'", path.display()))?,
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(&download.file.body)?;
                stdout.flush()?;
            }
        }

        info!(
            fid,
            filename = %download.file.filename,
            bytes = download.file.body.len(),
            counted = download.counted,
            "file served"
        );
        Ok(())
    }
}
