use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use gateherd::{ClientEvent, Frame, FrameHandler, Role};
use gateherd_probe::bin_common::{config_path_from_env, load_client_config, parse_args};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Logs every data frame the consumer and reader children receive
struct PrintHandler;

#[async_trait]
impl FrameHandler for PrintHandler {
    async fn on_connected(&self, child: &str) {
        info!("[{}] link established", child);
    }

    async fn on_frame(&self, child: &str, frame: Frame) -> gateherd::Result<()> {
        if let Some(text) = frame.as_text() {
            info!("[{}] {}", child, text);
        } else if let Some(data) = frame.as_binary() {
            info!("[{}] {} binary bytes", child, data.len());
        } else {
            info!("[{}] {:?}", child, frame);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("info,gateherd=debug")
        .init();

    // First positional argument overrides the environment lookup
    let config_path = parse_args()
        .into_iter()
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(config_path_from_env);
    info!("loading config from {}", config_path.display());
    let config = load_client_config(&config_path)?;

    let client = gateherd::builder(config)
        .handler(Role::Consumer, PrintHandler)
        .handler(Role::Reader, PrintHandler)
        .start()
        .await?;
    print_banner(client.name(), &client.plan().child_names());

    let mut events = client.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(ClientEvent::ChildExited { child, reason }) => {
                    warn!("child '{}' exited: {}", child, reason);
                }
                Ok(event) => info!("{:?}", event),
                Err(RecvError::Lagged(missed)) => {
                    warn!("event stream lagged, {} events missed", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    client.shutdown().await?;
    print_shutdown();
    Ok(())
}

fn print_banner(instance: &str, children: &[&str]) {
    info!("");
    info!("========================================");
    info!("Starting gateherd probe '{}'", instance);
    info!("Children: {}", children.join(", "));
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown() {
    info!("");
    info!("========================================");
    info!("Gateherd probe stopped gracefully");
    info!("========================================");
}
