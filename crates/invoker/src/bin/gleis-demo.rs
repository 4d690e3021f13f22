//! gleis-demo — submit a batch of demo operations to the invoker and
//! watch them settle.
//!
//! # Usage
//!
//! ```bash
//! # Eight sequential operations (the default lane mode)
//! gleis-demo
//!
//! # Twenty parallel operations, every third one failing preparation
//! gleis-demo --ops 20 --parallel --fail-every 3
//!
//! # Via environment variables
//! GLEIS_DEMO_OPS=50 GLEIS_PREPARE_TIMEOUT_MS=1000 gleis-demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use gleis_core::{Operation, OperationOwner};
use gleis_invoker::{config, Invoker};

/// Submit demo operations to the invoker and report how they settled.
#[derive(Parser, Debug)]
#[command(name = "gleis-demo", version, about)]
struct Cli {
    /// Number of operations to submit.
    #[arg(long, env = "GLEIS_DEMO_OPS", default_value_t = 8)]
    ops: usize,

    /// Use the parallel lane instead of the sequential default.
    #[arg(long, env = "GLEIS_DEMO_PARALLEL")]
    parallel: bool,

    /// Preparation delay per operation in milliseconds.
    #[arg(long, env = "GLEIS_DEMO_PREPARE_DELAY_MS", default_value_t = 100)]
    prepare_delay_ms: u64,

    /// Run duration per operation in milliseconds.
    #[arg(long, env = "GLEIS_DEMO_RUN_DELAY_MS", default_value_t = 250)]
    run_delay_ms: u64,

    /// Fail preparation of every Nth operation (0 = never).
    #[arg(long, env = "GLEIS_DEMO_FAIL_EVERY", default_value_t = 0)]
    fail_every: usize,
}

/// Demo operation: sleeps through preparation, then burns a little time
/// in `run`.
struct DemoOperation {
    name: String,
    prepare_delay: Duration,
    run_delay: Duration,
    fail: bool,
}

#[async_trait]
impl Operation for DemoOperation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn prepare(&self) -> bool {
        tokio::time::sleep(self.prepare_delay).await;
        !self.fail
    }

    fn run(&self) {
        std::thread::sleep(self.run_delay);
        info!(op = %self.name, "demo work done");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    config::load_dotenv();
    let cli = Cli::parse();
    info!(?cli, "starting gleis-demo");

    let invoker = Invoker::global();
    invoker.set_in_sequence(!cli.parallel);

    let owners: Vec<OperationOwner> = (0..cli.ops)
        .map(|i| {
            let fail = cli.fail_every > 0 && (i + 1) % cli.fail_every == 0;
            OperationOwner::from_arc(Arc::new(DemoOperation {
                name: format!("demo-{i}"),
                prepare_delay: Duration::from_millis(cli.prepare_delay_ms),
                run_delay: Duration::from_millis(cli.run_delay_ms),
                fail,
            }))
        })
        .collect();

    for owner in &owners {
        invoker.execute(owner.handle(), false);
    }

    loop {
        let m = invoker.metrics();
        if m.settled() >= cli.ops as u64 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let metrics = invoker.metrics();
    info!(
        summary = %serde_json::to_string(&metrics)?,
        "all operations settled"
    );
    Ok(())
}
