//! Minimal job runner over the dispatcher.
//!
//! Builds a small pool whose runtimes need one warm-up attempt before they
//! accept work, submits the reference jobs and prints the final records.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use runtime_dispatch::{
    DispatchConfig, Dispatcher, InMemoryJobStore, JobCommand, JobMode, LookupRuntime, Runtime,
    RuntimePool,
};
use tracing_subscriber::EnvFilter;

/// Runtime that refuses its first job (negative code) while it warms up.
struct WarmingRuntime {
    warm: AtomicBool,
    inner: LookupRuntime,
}

impl WarmingRuntime {
    fn new(delay: Duration) -> Self {
        Self {
            warm: AtomicBool::new(false),
            inner: LookupRuntime::new(delay),
        }
    }
}

#[async_trait]
impl Runtime for WarmingRuntime {
    fn name(&self) -> &str {
        "warming-lookup"
    }

    async fn execute(&self, command: &str, mode: JobMode) -> i32 {
        if !self.warm.swap(true, Ordering::SeqCst) {
            return -1;
        }
        self.inner.execute(command, mode).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DispatchConfig::resolve()?
        .with_execution_delay(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(100));

    let delay = config.execution_delay;
    let pool = Arc::new(RuntimePool::from_fn(config.pool_size, |_| -> Arc<dyn Runtime> {
        Arc::new(WarmingRuntime::new(delay))
    }));
    let store = Arc::new(InMemoryJobStore::new());
    let dispatcher = Dispatcher::start(config, store, pool)?;

    println!("Pool:    {} slots", dispatcher.pool().len());
    println!("Workers: {}", dispatcher.config().workers);
    println!();

    let jobs = [
        ("X(0), Y(0), X(0)", "echo"),
        ("X(90), Y(0), Z(90)", "VERBATIM"),
        ("Z(0), Z(180), X(90)", "simulation"),
        ("Z(90), Y(180), X(0)", "Echo"),
        ("X(45), Y(45)", "verbatim"),
    ];

    let mut ids = Vec::new();
    for (text, mode) in jobs {
        let id = dispatcher
            .submit(JobCommand::parse(text)?, mode.parse::<JobMode>()?)
            .await?;
        println!("Submitted {id}: {text} ({mode})");
        ids.push(id);
    }

    // Rejected before submission.
    if let Err(e) = "turbo".parse::<JobMode>() {
        println!("Rejected mode: {e}");
    }
    if let Err(e) = JobCommand::parse("X(0), cY(0)") {
        println!("Rejected job:  {e}");
    }
    println!();

    for id in ids {
        let record = dispatcher.wait_for(id, Duration::from_secs(30)).await?;
        println!("{}", serde_json::to_string_pretty(&record.to_view())?);
    }

    let avail = dispatcher.availability();
    println!(
        "\nFree slots: {}/{} (queued: {})",
        avail.free_slots, avail.pool_size, avail.queue_depth
    );

    dispatcher.shutdown().await;
    Ok(())
}
