//! Service profiles.
//!
//! A profile describes the listener every node runs and the simulated
//! stream it reads from. Profiles are TOML files:
//!
//! ```toml
//! [listener]
//! connection_target = "Endpoint=sb://sample.example.net/"
//! stream = "orders"
//! mode = "safe-distribute"
//! batch_size = 10
//! nodes = ["n0", "n1", "n2"]
//!
//! [broker]
//! partitions = 8
//!
//! [checkpoint]
//! directory = "/var/lib/tributary"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tributary_assign::AssignmentMode;
use tributary_checkpoint::{CheckpointStore, FilesystemConfig, DEFAULT_STORE_NAME};
use tributary_core::{Epoch, BATCH_SIZE_DEFAULT};
use tributary_listener::{
    EventProcessor, FlushPolicy, ListenerConfig, ListenerConfigBuilder, DEFAULT_RECEIVE_WAIT,
};

/// Listener settings shared by every node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerSection {
    /// Broker connection string.
    pub connection_target: String,
    /// Stream name.
    pub stream: String,
    /// Consumer group. Empty selects the default group.
    pub consumer_group: String,
    /// Assignment mode name.
    pub mode: String,
    /// Events per processor call.
    pub batch_size: u32,
    /// Node ids of the service.
    pub nodes: Vec<String>,
    /// Partition owned in single mode.
    pub assigned_partition: Option<String>,
    /// Start offset for partitions without a checkpoint.
    pub start_offset: Option<String>,
    /// Whether the start offset itself is delivered.
    pub start_offset_inclusive: bool,
    /// Start time for partitions without a checkpoint (µs since the Unix epoch).
    pub start_time_us: Option<u64>,
    /// Fencing epoch.
    pub epoch: Option<u64>,
    /// Deliver partial batches on stop.
    pub flush_on_stop: bool,
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            connection_target: "Endpoint=sb://sample.example.net/".to_string(),
            stream: "orders".to_string(),
            consumer_group: String::new(),
            mode: AssignmentMode::default().to_string(),
            batch_size: BATCH_SIZE_DEFAULT,
            nodes: vec!["n0".to_string(), "n1".to_string(), "n2".to_string()],
            assigned_partition: None,
            start_offset: None,
            start_offset_inclusive: false,
            start_time_us: None,
            epoch: None,
            flush_on_stop: false,
        }
    }
}

/// Simulated stream settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerSection {
    /// Number of partitions.
    pub partitions: u32,
    /// Broker-side receive wait in milliseconds.
    pub receive_wait_ms: u64,
    /// Delay between published events in milliseconds.
    pub publish_interval_ms: u64,
    /// Payload size of published events in bytes.
    pub payload_size: usize,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            partitions: 8,
            receive_wait_ms: u64::try_from(DEFAULT_RECEIVE_WAIT.as_millis()).unwrap_or(50),
            publish_interval_ms: 5,
            payload_size: 64,
        }
    }
}

/// Checkpoint store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CheckpointSection {
    /// Directory for the filesystem store. Unset keeps checkpoints in memory.
    pub directory: Option<PathBuf>,
    /// Store name under the directory.
    pub store_name: String,
    /// Prefix of every record file.
    pub entry_prefix: String,
    /// Whether to fsync every save.
    pub sync_on_write: bool,
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            directory: None,
            store_name: DEFAULT_STORE_NAME.to_string(),
            entry_prefix: String::new(),
            sync_on_write: true,
        }
    }
}

impl CheckpointSection {
    /// Returns the filesystem store configuration, if a directory is set.
    #[must_use]
    pub fn filesystem_config(&self) -> Option<FilesystemConfig> {
        let directory = self.directory.as_ref()?;
        let mut config = FilesystemConfig::new(directory)
            .with_store_name(self.store_name.clone())
            .with_entry_prefix(self.entry_prefix.clone());
        config.sync_on_write = self.sync_on_write;
        Some(config)
    }
}

/// A complete service profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceProfile {
    /// Listener settings.
    pub listener: ListenerSection,
    /// Simulated broker settings.
    pub broker: BrokerSection,
    /// Checkpoint store settings.
    pub checkpoint: CheckpointSection,
}

impl ServiceProfile {
    /// Loads a profile from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| ProfileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parses a profile from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML cannot be parsed.
    pub fn from_toml(toml: &str) -> Result<Self, ProfileError> {
        toml::from_str(toml).map_err(|e| ProfileError::Parse {
            message: e.to_string(),
        })
    }

    /// Serializes the profile to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Returns the assignment mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode name is unknown.
    pub fn mode(&self) -> Result<AssignmentMode, ProfileError> {
        self.listener
            .mode
            .parse()
            .map_err(|e: tributary_assign::AssignmentError| ProfileError::Invalid {
                message: e.to_string(),
            })
    }

    /// Builds the listener configuration for one node.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode is unknown or the configuration is
    /// rejected.
    pub fn listener_config(
        &self,
        node_id: &str,
        processor: Arc<dyn EventProcessor>,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<ListenerConfig, ProfileError> {
        let section = &self.listener;
        let mut builder: ListenerConfigBuilder = ListenerConfig::builder()
            .connection_target(section.connection_target.clone())
            .stream_name(section.stream.clone())
            .consumer_group(section.consumer_group.clone())
            .node_id(node_id)
            .mode(self.mode()?)
            .batch_size(section.batch_size)
            .processor(processor)
            .checkpoint_store(store);

        if !section.nodes.is_empty() {
            builder = builder.node_ids(section.nodes.iter().map(String::as_str));
        }
        if let Some(partition) = &section.assigned_partition {
            builder = builder.assigned_partition(partition.as_str());
        }
        if let Some(offset) = &section.start_offset {
            builder = builder.start_offset(offset.as_str(), section.start_offset_inclusive);
        }
        if let Some(timestamp_us) = section.start_time_us {
            builder = builder.start_time_us(timestamp_us);
        }
        if let Some(epoch) = section.epoch {
            builder = builder.epoch(Epoch::new(epoch));
        }
        if section.flush_on_stop {
            builder = builder.flush_policy(FlushPolicy::FlushOnStop);
        }

        builder.build().map_err(|e| ProfileError::Invalid {
            message: e.to_string(),
        })
    }
}

/// Error type for profile operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// I/O error reading profile file.
    #[error("failed to read profile from {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Parse error in TOML.
    #[error("failed to parse profile: {message}")]
    Parse {
        /// Error message.
        message: String,
    },
    /// The profile describes an unusable listener.
    #[error("invalid profile: {message}")]
    Invalid {
        /// Error message.
        message: String,
    },
}
