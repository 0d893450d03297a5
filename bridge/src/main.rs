//! Doorbridge - Entry Point
//!
//! Bridges a DoorBird device's HTTP API and a home-automation state store.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::Context;
use doorbridge::app::options::AppOptions;
use doorbridge::app::run::run;
use doorbridge::filesys::file::File;
use doorbridge::logs::{init_logging, LogOptions};
use doorbridge::scanner::wizard::Wizard;
use doorbridge::storage::layout::StorageLayout;
use doorbridge::storage::settings::{load_settings, Settings};
use doorbridge::utils::version_info;
use doorbridge::workers::heartbeat::SyncTrigger;

use tokio::sync::oneshot;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to print version: {}", e),
        }
        return;
    }

    // Retrieve the settings file; --config moves the base directory to its parent
    let (layout, settings_file) = match cli_args.get("config") {
        Some(path) => {
            let file = File::new(path);
            let base = match file.path().parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (StorageLayout::new(base), file)
        }
        None => {
            let layout = StorageLayout::default();
            let file = layout.settings_file();
            (layout, file)
        }
    };
    let settings = match read_settings(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{:#}", e);
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Run the discovery wizard
    if cli_args.contains_key("discover") {
        match Wizard::default().discover().await {
            Ok(device) => match serde_json::to_string_pretty(&device) {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to print device: {}", e),
            },
            Err(e) => error!("Discovery failed: {}", e),
        }
        return;
    }

    // Run the bridge starting here
    let mut options = match AppOptions::from_settings(&settings, layout.clone()) {
        Ok(options) => options,
        Err(e) => {
            warn!("{}", e);
            warn!("Update {} and restart", settings_file.path().display());
            return;
        }
    };

    let mut hangups = Hangups::new();
    let shutdown = await_shutdown_signal();
    tokio::pin!(shutdown);

    'bridge: loop {
        info!("Running doorbridge with options: {:?}", options);
        let (sync_trigger, sync_requests) = SyncTrigger::new();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let running = run(version.version.clone(), options.clone(), sync_requests, async move {
            let _ = stop_rx.await;
        });
        tokio::pin!(running);

        loop {
            tokio::select! {
                result = &mut running => {
                    if let Err(e) = result {
                        error!("Failed to run the bridge: {e}");
                    }
                    return;
                }
                _ = &mut shutdown => {
                    let _ = stop_tx.send(());
                    if let Err(e) = (&mut running).await {
                        error!("Failed to shut down the bridge: {e}");
                    }
                    return;
                }
                _ = hangups.recv() => {
                    info!("SIGHUP received, reloading {}...", settings_file.path().display());
                    let reloaded = match reload_options(&settings_file, &layout).await {
                        Ok(reloaded) => reloaded,
                        Err(e) => {
                            warn!("{:#}", e);
                            warn!("Keeping the current settings");
                            sync_trigger.request();
                            continue;
                        }
                    };

                    if options.requires_restart(&reloaded) {
                        info!("Listener or device settings changed, restarting the bridge...");
                        options = reloaded;
                        let _ = stop_tx.send(());
                        if let Err(e) = (&mut running).await {
                            error!("Failed to shut down the bridge: {e}");
                        }
                        continue 'bridge;
                    }

                    if !sync_trigger.reload(reloaded.sync.clone()) {
                        info!("A cycle is already pending");
                    }
                    options = reloaded;
                }
            }
        }
    }
}

async fn read_settings(file: &File) -> anyhow::Result<Settings> {
    load_settings(file)
        .await
        .with_context(|| format!("Unable to read settings file {}", file.path().display()))
}

async fn reload_options(file: &File, layout: &StorageLayout) -> anyhow::Result<AppOptions> {
    let settings = read_settings(file).await?;
    AppOptions::from_settings(&settings, layout.clone())
        .with_context(|| format!("Invalid settings in {}", file.path().display()))
}

/// SIGHUP notifications; never fires where they can't be received
struct Hangups {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl Hangups {
    fn new() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let signal = match signal(SignalKind::hangup()) {
                Ok(signal) => Some(signal),
                Err(e) => {
                    warn!("Unable to listen for SIGHUP: {}", e);
                    None
                }
            };
            Self { signal }
        }

        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    async fn recv(&mut self) {
        #[cfg(unix)]
        if let Some(signal) = self.signal.as_mut() {
            if signal.recv().await.is_some() {
                return;
            }
            self.signal = None;
        }
        std::future::pending::<()>().await
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    warn!("Unable to install signal handlers, waiting for Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl+C received, shutting down...");
    }
}
