use crate::format::{DEFAULT_BLOCK_SIZE, DEFAULT_QUEUE_CAPACITY, MAX_BLOCK_SIZE};

/// Tuning knobs for [`compress_stream`](crate::compress_stream).
///
/// None of these change the decoded output. `block_size` only changes how
/// many codec units the payload is split into, and `workers` only changes
/// how many of them are compressed at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Raw bytes per block (the last block may be smaller).
    pub block_size: usize,
    /// Number of compress-stage worker threads.
    pub workers: usize,
    /// Capacity of each handoff queue between stages.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            workers: num_cpus::get().max(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn new(block_size: usize, workers: usize) -> Self {
        Self {
            block_size,
            workers,
            ..Self::default()
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            anyhow::bail!(
                "invalid block size {}: must be between 1 and {} bytes",
                self.block_size,
                MAX_BLOCK_SIZE
            );
        }
        if self.workers == 0 {
            anyhow::bail!("invalid worker count 0: at least one compress worker is required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.block_size, 128 * 1024);
        assert!(config.workers >= 1);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_workers_and_bad_block_sizes() {
        assert!(PipelineConfig::new(4096, 0).validate().is_err());
        assert!(PipelineConfig::new(0, 1).validate().is_err());
        assert!(PipelineConfig::new(MAX_BLOCK_SIZE + 1, 1).validate().is_err());
        assert!(PipelineConfig::new(MAX_BLOCK_SIZE, 1).validate().is_ok());
    }
}
