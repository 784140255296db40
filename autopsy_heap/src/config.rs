//! Inspector configuration parameters.
//!
//! All sizes and limits are tunable for different target images.
//! Defaults suit a typical 64-bit workstation dump.

/// Configuration for the heap inspector.
///
/// # Example
///
/// ```ignore
/// use autopsy_heap::InspectorConfig;
///
/// // Wider read window for a fully-resident dump on fast storage
/// let config = InspectorConfig {
///     cache_window_size: 256 * 1024,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    /// Size of the contiguous memory window each walk caches, in
    /// bytes.
    ///
    /// Larger windows reduce round-trips to the data reader at the
    /// cost of per-enumeration memory. One window exists per live
    /// enumeration (never shared across threads).
    ///
    /// Default: 64 KiB
    pub cache_window_size: usize,

    /// Careful-mode object size limit for non-large segments.
    ///
    /// When reference enumeration runs in careful mode, an object on
    /// a non-large segment whose computed size reaches this limit is
    /// treated as corrupt and skipped.
    ///
    /// Default: 85 000 (the collector's large-object threshold)
    pub oversize_limit: u64,

    /// Upper bound on concurrent per-root search tasks in parallel
    /// path finding.
    ///
    /// Default: available parallelism, minimum 1
    pub max_tasks: usize,

    /// Whether path searches may fan out in parallel when the data
    /// reader reports a fully memory-resident image.
    ///
    /// Default: true
    pub allow_parallel_search: bool,

    /// Capacity of the heap-walk step log. Zero disables step
    /// logging.
    ///
    /// The log is a debugging aid with no effect on results.
    ///
    /// Default: 0 (disabled)
    pub step_log_capacity: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            cache_window_size: 64 * 1024,
            oversize_limit: 85_000,
            max_tasks: num_cpus(),
            allow_parallel_search: true,
            step_log_capacity: 0,
        }
    }
}

impl InspectorConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Below 4 KiB the window reloads on nearly every object.
        if self.cache_window_size < 4096 {
            return Err(ConfigError::WindowTooSmall);
        }
        if self.max_tasks == 0 {
            return Err(ConfigError::InvalidMaxTasks);
        }
        if self.oversize_limit == 0 {
            return Err(ConfigError::InvalidOversizeLimit);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Cache window is too small (minimum 4 KiB).
    WindowTooSmall,
    /// `max_tasks` must be at least 1.
    InvalidMaxTasks,
    /// Oversize limit must be non-zero.
    InvalidOversizeLimit,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::WindowTooSmall => write!(f, "cache window must be at least 4KB"),
            ConfigError::InvalidMaxTasks => write!(f, "max_tasks must be at least 1"),
            ConfigError::InvalidOversizeLimit => write!(f, "oversize limit must be non-zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Get the number of available CPUs.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
