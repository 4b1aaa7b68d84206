use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Address workers report results to.
    #[serde(default = "default_callback_address")]
    pub callback_address: String,

    /// Capacity of the queue feeding results into a session.
    #[serde(default = "default_resolution_buffer_size")]
    pub resolution_buffer_size: usize,

    #[serde(default = "default_evaluation_timeout", with = "duration_ms")]
    pub evaluation_timeout: Duration,

    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Simulated latency of each operation.
    #[serde(default = "default_worker_delay", with = "duration_ms")]
    pub delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            delay: default_worker_delay(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            callback_address: default_callback_address(),
            resolution_buffer_size: default_resolution_buffer_size(),
            evaluation_timeout: default_evaluation_timeout(),
            worker: WorkerConfig::default(),
        }
    }
}

impl SystemConfig {
    // JSON file, missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> WorkflowResult<Self> {
        from_file(path)
    }

    pub fn validate(&self) -> WorkflowResult<()> {
        if self.resolution_buffer_size == 0 {
            return Err(WorkflowError::Config(
                "resolution_buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.callback_address.is_empty() {
            return Err(WorkflowError::Config(
                "callback_address must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> WorkflowResult<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> WorkflowResult<T> {
    let config = serde_json::from_str(s)?;
    Ok(config)
}

fn default_callback_address() -> String {
    "local".to_string()
}

fn default_resolution_buffer_size() -> usize {
    64
}

fn default_evaluation_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_worker_delay() -> Duration {
    Duration::from_millis(100)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
