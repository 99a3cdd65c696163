// dlbridge Linux: loads the native engine and serves its method channel on loopback.

mod config;
mod native;
mod server;

use std::path::PathBuf;

use dlbridge_core::Channel;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("dlbridge-linux {}", VERSION);
                return Ok(());
            }
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config_path = Some(PathBuf::from(path));
            }
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }

    let (cfg, skipped) = match &config_path {
        Some(path) => (config::load_from(path)?, None),
        None => config::load(),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if let Some(err) = skipped {
        tracing::warn!(error = %err, "ignoring config file");
    }
    tracing::info!(version = VERSION, channel = %cfg.channel, "starting");

    let engine = native::load(&cfg.engine_library, &cfg.engine_symbol)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let listener = server::bind(cfg.listen_port).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        let handle = Channel::new(cfg.channel.clone(), engine).spawn(cfg.queue_capacity);
        tokio::select! {
            res = server::run_server(listener, handle) => res?,
            res = shutdown_signal() => {
                res?;
                tracing::info!("shutting down");
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix). On shutdown, runtime and tasks exit; systemd may restart if configured.
async fn shutdown_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
