//! Tributary sample service.
//!
//! Runs one listener per node against an in-process simulated stream, with
//! a publisher task feeding every partition round-robin.
//!
//! ```bash
//! # Three nodes sharing eight partitions, checkpoints in memory.
//! tributary-sample --run-for-ms 2000
//!
//! # One node of the profile's cluster, checkpoints on disk.
//! tributary-sample --profile service.toml --node-id n1 --checkpoint-dir /tmp/tributary
//! ```
//!
//! Stopping with Ctrl-C (or after `--run-for-ms`) closes every listener.
//! Restarting with the same checkpoint directory resumes each partition
//! after its last checkpoint.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tributary_checkpoint::{CheckpointStore, FilesystemCheckpointStore, SimulatedCheckpointStore};
use tributary_core::NodeId;
use tributary_listener::{Listener, SimulatedBroker, SimulatedBrokerConfig};
use tributary_sample::{LoggingProcessor, ServiceProfile};

/// How long a listener gets to close before it is aborted.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tributary sample service.
#[derive(Parser, Debug)]
#[command(name = "tributary-sample")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service profile (TOML). Built-in defaults are used when omitted.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Run only this node. Every node of the profile runs when omitted.
    #[arg(long)]
    node_id: Option<String>,

    /// Stop after this many milliseconds instead of waiting for Ctrl-C.
    #[arg(long)]
    run_for_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Override the partition count.
    #[arg(long)]
    partitions: Option<u32>,

    /// Override the batch size.
    #[arg(long)]
    batch_size: Option<u32>,

    /// Override the assignment mode.
    #[arg(long)]
    mode: Option<String>,

    /// Keep checkpoints in this directory instead of in memory.
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
}

impl Args {
    /// Loads the profile and applies command-line overrides.
    fn profile(&self) -> Result<ServiceProfile, tributary_sample::ProfileError> {
        let mut profile = match &self.profile {
            Some(path) => ServiceProfile::from_file(path)?,
            None => ServiceProfile::default(),
        };
        if let Some(partitions) = self.partitions {
            profile.broker.partitions = partitions;
        }
        if let Some(batch_size) = self.batch_size {
            profile.listener.batch_size = batch_size;
        }
        if let Some(mode) = &self.mode {
            profile.listener.mode.clone_from(mode);
        }
        if let Some(dir) = &self.checkpoint_dir {
            profile.checkpoint.directory = Some(dir.clone());
        }
        // Validate the mode up front so a typo fails before anything starts.
        profile.mode()?;
        Ok(profile)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let profile = args.profile()?;
    let nodes: Vec<String> = match &args.node_id {
        Some(node_id) => vec![node_id.clone()],
        None => profile.listener.nodes.clone(),
    };
    if nodes.is_empty() {
        return Err("profile lists no nodes and --node-id was not given".into());
    }

    info!(
        stream = %profile.listener.stream,
        mode = %profile.listener.mode,
        partitions = profile.broker.partitions,
        batch_size = profile.listener.batch_size,
        nodes = ?nodes,
        checkpoint_dir = ?profile.checkpoint.directory,
        "Starting Tributary sample"
    );

    let broker = SimulatedBroker::new(
        SimulatedBrokerConfig::with_partition_count(profile.broker.partitions)
            .with_receive_wait(Duration::from_millis(profile.broker.receive_wait_ms)),
    );

    let store: Arc<dyn CheckpointStore> = match profile.checkpoint.filesystem_config() {
        Some(config) => {
            let store = FilesystemCheckpointStore::open(config).await?;
            let existing = store.list_records().await?;
            info!(
                dir = %store.config().store_dir().display(),
                checkpoints = existing.len(),
                "Opened checkpoint store"
            );
            Arc::new(store)
        }
        None => Arc::new(SimulatedCheckpointStore::new(0)),
    };

    // ----- Listeners -----

    let mut listeners = Vec::with_capacity(nodes.len());
    let mut processors = Vec::with_capacity(nodes.len());
    for node_id in &nodes {
        let processor = LoggingProcessor::new(NodeId::new(node_id.as_str()));
        let config =
            profile.listener_config(node_id, Arc::new(processor.clone()), Arc::clone(&store))?;
        let mut listener = Listener::new(config, broker.clone());

        let identity = listener.open().await?;
        let owned = listener.start().await?;
        info!(
            node = %node_id,
            identity = %identity,
            owned = ?owned.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Listener started"
        );

        listeners.push(listener);
        processors.push(processor);
    }

    // ----- Publisher -----

    let publisher = {
        let broker = broker.clone();
        let interval = Duration::from_millis(profile.broker.publish_interval_ms.max(1));
        let payload_size = profile.broker.payload_size;
        tokio::spawn(async move {
            let partition_ids = broker.partition_ids();
            let mut sequence: u64 = 0;
            loop {
                for partition_id in &partition_ids {
                    let mut body = format!("event-{sequence}").into_bytes();
                    body.resize(payload_size.max(body.len()), b'.');
                    broker.publish(partition_id, Bytes::from(body));
                    sequence += 1;
                }
                tokio::time::sleep(interval).await;
            }
        })
    };

    // ----- Run -----

    match args.run_for_ms {
        Some(run_for_ms) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                () = tokio::time::sleep(Duration::from_millis(run_for_ms)) => {
                    info!(run_for_ms, "Run time elapsed");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Received Ctrl-C");
        }
    }

    publisher.abort();

    // ----- Shutdown -----

    let mut failures = 0usize;
    for (listener, processor) in listeners.iter_mut().zip(&processors) {
        let node_id = listener.config().node_id().clone();
        match tokio::time::timeout(CLOSE_TIMEOUT, listener.close()).await {
            Ok(Ok(())) => info!(
                node = %node_id,
                events = processor.event_count(),
                batches = processor.batch_count(),
                "Listener closed"
            ),
            Ok(Err(e)) => {
                failures += 1;
                error!(node = %node_id, error = %e, "Listener closed with error");
            }
            Err(_) => {
                failures += 1;
                warn!(node = %node_id, "Close timed out, aborting listener");
                listener.abort().await;
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} listener(s) failed").into());
    }
    Ok(())
}
