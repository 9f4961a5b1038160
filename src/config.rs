use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://free-goat-api.onrender.com/magicstudio";
pub const DEFAULT_HISTORY_KEY: &str = "dtm_image_history_v1";
pub const DEFAULT_HISTORY_CAPACITY: usize = 32;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const MIN_BATCH: usize = 1;
pub const MAX_BATCH: usize = 4;

/// Cadence and shape of the synthetic progress signal.
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    pub tick_interval: Duration,
    pub start_percent: u8,
    /// Highest value the ticker climbs to while requests are outstanding.
    pub ceiling_percent: u8,
    pub step_divisor: u8,
    pub reset_delay: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        ProgressConfig {
            tick_interval: Duration::from_millis(220),
            start_percent: 8,
            ceiling_percent: 92,
            step_divisor: 12,
            reset_delay: Duration::from_millis(450),
        }
    }
}

impl ProgressConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub key: String,
    pub directory: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            capacity: DEFAULT_HISTORY_CAPACITY,
            key: DEFAULT_HISTORY_KEY.to_string(),
            directory: PathBuf::from(".rgenimage"),
        }
    }
}

impl HistoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let capacity = env::var("STUDIO_HISTORY_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|c: &usize| *c > 0)
            .unwrap_or(defaults.capacity);
        let key = env::var("STUDIO_HISTORY_KEY").unwrap_or(defaults.key);
        let directory = env::var("STUDIO_HISTORY_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.directory);

        HistoryConfig {
            capacity,
            key,
            directory,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub endpoint: String,
    /// `None` leaves requests without a deadline.
    pub request_timeout: Option<Duration>,
    pub history: HistoryConfig,
    pub progress: ProgressConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        StudioConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            history: HistoryConfig::default(),
            progress: ProgressConfig::default(),
        }
    }
}

impl StudioConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let endpoint =
            env::var("STUDIO_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let request_timeout = match env::var("STUDIO_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_REQUEST_TIMEOUT),
        };

        StudioConfig {
            endpoint,
            request_timeout,
            history: HistoryConfig::from_env(),
            progress: ProgressConfig::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }
}
