use anyhow::{Context, Result};
use clap::Parser;
use craftconsole_cli::{Cli, Command};
use craftconsole_config::{AppConfig, AppPaths, ConfigManager};
use craftconsole_core::{spawn_pump, ConnectionRegistry, ConsoleRenderer, ConsoleView, EventBus, ViewSettings};
use craftconsole_ws::{WsClient, WsConnectConfig};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AppPaths::new()?;
    let mut config_manager = ConfigManager::new(paths.clone());
    if let Some(path) = cli.config.clone() {
        config_manager = config_manager.with_config_file(path);
    }
    let config = config_manager.load(std::env::current_dir().ok().as_deref(), None)?;
    let interactive = matches!(cli.command, Some(Command::Connect { .. }));
    let _log_guard = init_logging(&config, &paths, config.logging.stdout && !interactive)?;

    match cli.command {
        Some(Command::Config { init }) => {
            if init {
                config_manager.save_default()?;
                println!(
                    "config initialized at {}",
                    config_manager.paths.config_file.display()
                );
            } else {
                println!("{}", config_manager.paths.config_file.display());
            }
        }
        Some(Command::Servers) | None => {
            print_servers(&config);
        }
        Some(Command::Render {
            file,
            timestamps,
            html,
        }) => {
            render_file(&file, timestamps, html).await?;
        }
        Some(Command::Connect { server }) => {
            connect(config_manager, config, &paths, &server).await?;
        }
    }

    Ok(())
}

fn print_servers(config: &AppConfig) {
    if config.servers.is_empty() {
        println!("no servers configured");
        return;
    }
    for server in &config.servers {
        let saved = if server.password.is_some() {
            " (password saved)"
        } else {
            ""
        };
        println!("{}\t{}{}", server.name, server.uri, saved);
    }
}

async fn render_file(file: &Path, timestamps: bool, html: bool) -> Result<()> {
    let handle = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("open {}", file.display()))?;
    let renderer = ConsoleRenderer::new(timestamps);
    let mut lines = BufReader::new(handle).lines();
    while let Some(raw) = lines.next_line().await? {
        let line = renderer.render(&raw, None);
        if html {
            println!("{}", line.to_html());
        } else {
            println!("{}", line.plain_text());
        }
    }
    Ok(())
}

async fn connect(
    config_manager: ConfigManager,
    config: AppConfig,
    paths: &AppPaths,
    server: &str,
) -> Result<()> {
    let profile = config
        .server(server)
        .cloned()
        .with_context(|| format!("unknown server {server}"))?;

    let bus = EventBus::new(256);
    let registry = ConnectionRegistry::new(bus.clone());
    let conn = registry.open(&profile.name);
    conn.mark_connecting();

    let ws_config = WsConnectConfig {
        uri: profile.uri.clone(),
        connect_timeout_ms: config.transport.connect_timeout_ms,
        outbound_queue: config.transport.outbound_queue,
    };
    let (link, frames) = match WsClient::connect(ws_config).await {
        Ok(pair) => pair,
        Err(err) => {
            error!(server = %profile.name, error = %err, "connect failed");
            conn.mark_disconnected();
            return Err(err);
        }
    };
    conn.attach(Arc::new(link));
    info!(server = %profile.name, uri = %profile.uri, "connected");
    let pump = spawn_pump(conn.clone(), frames);

    let settings = ViewSettings::from_config(&config, paths.downloads_dir.clone());
    let mut view = ConsoleView::new(conn, bus.clone(), settings, profile.password.clone());
    let live = view.resume();

    let result = craftconsole_tui::run(
        view,
        live,
        bus,
        config_manager,
        config,
        profile.name.clone(),
    )
    .await;

    registry.close(&profile.name);
    pump.abort();
    result
}

fn init_logging(
    config: &AppConfig,
    paths: &AppPaths,
    enable_stdout: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&paths.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "craftconsole.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let file_layer = if config.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if enable_stdout {
        let stdout_layer = if config.logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };
        tracing::subscriber::set_global_default(subscriber.with(stdout_layer))?;
    } else {
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(guard)
}
