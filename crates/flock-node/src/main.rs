use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use flock_protocol::{Runtime, RuntimeConfig};
use flock_transport::{Node, NodeConfig};

/// Gossip broadcast node. Reads requests on stdin, writes replies and
/// gossip on stdout, logs on stderr.
#[derive(Parser, Debug)]
#[command(name = "flock-node", version, about)]
struct Cli {
    /// Concurrent outbound gossip sends.
    #[arg(long, default_value = "10")]
    workers: usize,

    /// Deadline for one gossip delivery attempt, in ms.
    #[arg(long, default_value = "100")]
    send_timeout_ms: u64,

    /// Delay before retrying a failed delivery, in ms.
    #[arg(long, default_value = "0")]
    retry_backoff_ms: u64,

    /// Random extra retry delay, up to this many ms.
    #[arg(long, default_value = "0")]
    retry_jitter_ms: u64,

    /// Max message size in bytes.
    #[arg(long, default_value = "1048576")]
    max_message_size: usize,
}

impl Cli {
    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            workers: self.workers,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            retry_jitter: Duration::from_millis(self.retry_jitter_ms),
        }
    }

    fn node_config(&self) -> NodeConfig {
        NodeConfig::new().max_message_size(self.max_message_size)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries protocol traffic; logs go to stderr only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "starting");

    let node = Node::stdio(cli.node_config())
        .await
        .context("init handshake failed")?;
    tracing::info!(node = %node.id(), version = env!("CARGO_PKG_VERSION"), "flock-node ready");

    let runtime = Runtime::new(node.handle(), cli.runtime_config())
        .context("could not start runtime")?;
    runtime.run(node).await?;

    Ok(())
}
