use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Documents attempted per batch; one vector upsert call per batch.
    pub batch_size: usize,
    /// Relief valve: pause after this many batches to bound peak resource
    /// usage. Fixed, not adaptive.
    pub relief_batch_interval: usize,
    pub relief_pause: Duration,
    pub checkpoint_path: PathBuf,
}

impl LoaderConfig {
    pub fn new(checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            ..Self::default()
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 25,
            relief_batch_interval: 20,
            relief_pause: Duration::from_millis(500),
            checkpoint_path: PathBuf::from("load_progress.json"),
        }
    }
}
