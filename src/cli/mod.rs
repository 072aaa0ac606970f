use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{info, warn};

use crate::cache::{LocalCache, SqliteBackend};
use crate::config::Config;
use crate::engine::{RefreshOutcome, SyncEngine, SyncError};
use crate::notify::ToastBus;
use crate::poller::PollingReconciler;
use crate::remote::HttpRemoteStore;

pub mod render;

#[derive(Parser)]
#[command(name = "syncclip")]
#[command(about = "Share short text clips across devices, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Show clips, newest first")]
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,

        #[arg(short, long)]
        search: Option<String>,
    },

    #[command(about = "Post a new clip")]
    Post {
        content: String,

        #[arg(short, long)]
        note: Option<String>,
    },

    #[command(about = "Change an existing clip")]
    Edit {
        id: String,
        content: String,

        #[arg(short, long)]
        note: Option<String>,
    },

    #[command(about = "Delete a clip")]
    Delete {
        id: String,

        #[arg(long, help = "Restore the clip right after deleting it")]
        undo: bool,
    },

    #[command(about = "Fetch the latest clips from the server")]
    Refresh,

    #[command(about = "Keep polling the server and print changes until Ctrl-C")]
    Watch,

    #[command(about = "Show connection and cache status")]
    Status,

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Validate configuration")]
    Validate,
}

pub struct CliHandler {
    config: Arc<Config>,
    toasts: ToastBus,
    engine: Option<Arc<SyncEngine>>,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Arc::new(Config::load_config(config_path)?);

        Ok(Self {
            config,
            toasts: ToastBus::default(),
            engine: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lazily build the engine and load the collection
    async fn ensure_engine(&mut self) -> Result<Arc<SyncEngine>> {
        if let Some(engine) = &self.engine {
            return Ok(Arc::clone(engine));
        }

        info!("Initializing sync engine");
        let remote = HttpRemoteStore::new(&self.config.remote.base_url, self.config.request_timeout())
            .context("Failed to build remote store client")?;
        let cache = match SqliteBackend::open(&self.config.cache.path) {
            Ok(backend) => LocalCache::new(Arc::new(backend)),
            Err(e) => {
                warn!(
                    "Local cache at {} unavailable, running in memory: {}",
                    self.config.cache.path.display(),
                    e
                );
                LocalCache::in_memory()
            }
        };

        let engine = Arc::new(SyncEngine::new(
            Arc::new(remote),
            cache,
            Arc::new(self.toasts.clone()),
        ));
        let outcome = engine.bootstrap().await;
        info!("Initial load: {:?}", outcome);

        self.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        // Subscribe before anything can emit so no toast is missed. `watch`
        // prints toasts live instead.
        let mut toasts = (!matches!(command, Commands::Watch)).then(|| self.toasts.subscribe());

        let result = match command {
            Commands::List { limit, search } => self.list(limit, search).await,
            Commands::Post { content, note } => self.post(content, note).await,
            Commands::Edit { id, content, note } => self.edit(id, content, note).await,
            Commands::Delete { id, undo } => self.delete(id, undo).await,
            Commands::Refresh => self.refresh().await,
            Commands::Watch => self.watch().await,
            Commands::Status => self.show_status().await,
            Commands::Config { action } => self.handle_config_action(action),
        };

        if let Some(toasts) = toasts.as_mut() {
            loop {
                match toasts.try_recv() {
                    Ok(toast) => println!("{}", render::toast_line(&toast)),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        }

        result
    }

    async fn list(&mut self, limit: usize, search: Option<String>) -> Result<()> {
        let engine = self.ensure_engine().await?;
        let clips = engine.search(search.as_deref().unwrap_or("")).await;

        if clips.is_empty() {
            println!("No clips found");
            return Ok(());
        }

        println!("Clips (showing {} of {}):", clips.len().min(limit), clips.len());
        for (i, clip) in clips.iter().take(limit).enumerate() {
            println!("{:>3}. {}", i + 1, render::clip_line(clip));
        }
        Ok(())
    }

    async fn post(&mut self, content: String, note: Option<String>) -> Result<()> {
        let engine = self.ensure_engine().await?;
        match engine.submit(&content, note).await {
            Ok(clip) => {
                println!("{}", clip.id);
                Ok(())
            }
            Err(e) => report(e),
        }
    }

    async fn edit(&mut self, id: String, content: String, note: Option<String>) -> Result<()> {
        let engine = self.ensure_engine().await?;
        match engine.edit(&id, &content, note).await {
            Ok(()) => Ok(()),
            Err(e) => report(e),
        }
    }

    async fn delete(&mut self, id: String, undo: bool) -> Result<()> {
        let engine = self.ensure_engine().await?;
        if let Err(e) = engine.remove(&id).await {
            return report(e);
        }

        if undo {
            match engine.undo().await {
                Ok(restored) => println!("Restored as {}", restored.id),
                Err(e) => return report(e),
            }
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let engine = self.ensure_engine().await?;
        let outcome = engine.refresh_from_remote().await;
        let count = engine.view().await.len();
        match outcome {
            RefreshOutcome::Replaced => println!("Updated: {} clips", count),
            RefreshOutcome::Unchanged => println!("Up to date: {} clips", count),
            RefreshOutcome::Offline => println!("Offline: showing {} cached clips", count),
        }
        Ok(())
    }

    async fn watch(&mut self) -> Result<()> {
        if !self.config.poll.enabled {
            println!("Polling is disabled in the configuration");
            return Ok(());
        }

        let mut toasts = self.toasts.subscribe();
        let engine = self.ensure_engine().await?;
        let printer = tokio::spawn(async move {
            loop {
                match toasts.recv().await {
                    Ok(toast) => println!("{}", render::toast_line(&toast)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let mut connectivity_rx = engine.subscribe_connectivity();
        let reporter = tokio::spawn(async move {
            while connectivity_rx.changed().await.is_ok() {
                let state = *connectivity_rx.borrow_and_update();
                println!("Connection: {:?}", state);
            }
        });

        let handle = PollingReconciler::new(Arc::clone(&engine), self.config.poll_interval()).spawn();
        println!(
            "Watching {} every {}s, Ctrl-C to stop",
            self.config.remote.base_url, self.config.poll.interval_secs
        );

        let initial = engine.view().await;
        render::print_view(&initial);
        let mut last_ids = render::id_fingerprint(&initial);
        let mut redraw = tokio::time::interval(self.config.poll_interval());
        loop {
            tokio::select! {
                _ = redraw.tick() => {
                    let view = engine.view().await;
                    let ids = render::id_fingerprint(&view);
                    if ids != last_ids {
                        render::print_view(&view);
                        last_ids = ids;
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    break;
                }
            }
        }

        let stats = handle.shutdown().await;
        printer.abort();
        reporter.abort();
        info!("Polling stopped: {:?}", stats);
        Ok(())
    }

    async fn show_status(&mut self) -> Result<()> {
        let engine = self.ensure_engine().await?;

        println!("SyncClip Status:");
        println!("  Version: {}", crate::VERSION);
        println!("  Server: {}", self.config.remote.base_url);
        println!("  Cache: {}", self.config.cache.path.display());
        println!("  Connection: {:?}", engine.connectivity());
        println!("  Clips: {}", engine.view().await.len());

        Ok(())
    }

    fn handle_config_action(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                println!("Current Configuration:");
                println!("{:#?}", self.config);
            }
            ConfigAction::Init { force } => {
                let path = Config::default_config_path()?;
                Config::write_example(&path, force)?;
                println!("Example configuration written to {}", path.display());
            }
            ConfigAction::Validate => {
                // Config is already loaded and validated in CliHandler::new()
                println!("Configuration is valid");
            }
        }
        Ok(())
    }
}

/// Engine failures have already been rolled back and announced as toasts.
/// No-ops only get a hint; real failures still fail the command.
fn report(e: SyncError) -> Result<()> {
    if e.is_noop() {
        println!("Nothing to do");
        Ok(())
    } else {
        Err(e.into())
    }
}
