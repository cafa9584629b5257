use crate::persistence::aof::AofSettings;
use crate::store::expiry::ExpirySettings;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub loglevel: String,
    // Persistence
    pub dir: String,
    pub appendonly: bool,
    pub appendfilename: String,
    pub aof_flush_interval_ms: u64,
    pub aof_rewrite_percentage: u64,
    pub aof_rewrite_min_size: u64,
    pub aof_check_interval_ms: u64,
    pub aof_load_strict: bool,
    // Expiration
    pub expire_interval_ms: u64,
    pub expire_sample_size: usize,
    pub expire_max_iterations: usize,
    pub shutdown_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            loglevel: "info".to_string(),
            dir: ".".to_string(),
            appendonly: true,
            appendfilename: "appendonly.aof".to_string(),
            aof_flush_interval_ms: 1000,
            aof_rewrite_percentage: 100,
            aof_rewrite_min_size: 64 * 1024 * 1024,
            aof_check_interval_ms: 60_000,
            aof_load_strict: false,
            expire_interval_ms: 100,
            expire_sample_size: 20,
            expire_max_iterations: 2,
            shutdown_timeout_ms: 5000,
        }
    }
}

fn yes_no(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Overwrite `slot` if `value` parses; otherwise keep the current value.
fn parse_into<T: std::str::FromStr>(slot: &mut T, value: &str) {
    if let Ok(v) = value.parse() {
        *slot = v;
    }
}

impl Config {
    /// Parse `--flag value` pairs. Unknown flags are skipped along with their
    /// value; values that don't parse leave the default in place.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = Config::default();
        for pair in args.chunks(2) {
            if let [flag, value] = pair {
                config.apply(flag, value);
            }
        }
        config
    }

    fn apply(&mut self, flag: &str, value: &str) {
        match flag.trim_start_matches("--") {
            "bind" => self.bind = value.to_string(),
            "port" => parse_into(&mut self.port, value),
            "loglevel" => self.loglevel = value.to_string(),
            "dir" => self.dir = value.to_string(),
            "appendonly" => {
                if let Some(v) = yes_no(value) {
                    self.appendonly = v;
                }
            }
            "appendfilename" => self.appendfilename = value.to_string(),
            "aof-flush-interval-ms" => parse_into(&mut self.aof_flush_interval_ms, value),
            "auto-aof-rewrite-percentage" => parse_into(&mut self.aof_rewrite_percentage, value),
            "auto-aof-rewrite-min-size" => parse_into(&mut self.aof_rewrite_min_size, value),
            "aof-rewrite-check-interval-ms" => parse_into(&mut self.aof_check_interval_ms, value),
            "aof-load-strict" => {
                if let Some(v) = yes_no(value) {
                    self.aof_load_strict = v;
                }
            }
            "expire-interval-ms" => parse_into(&mut self.expire_interval_ms, value),
            "expire-sample-size" => parse_into(&mut self.expire_sample_size, value),
            "expire-max-iterations" => parse_into(&mut self.expire_max_iterations, value),
            "shutdown-timeout-ms" => parse_into(&mut self.shutdown_timeout_ms, value),
            _ => {}
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn aof_path(&self) -> PathBuf {
        PathBuf::from(&self.dir).join(&self.appendfilename)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn aof_settings(&self) -> AofSettings {
        AofSettings {
            flush_interval: Duration::from_millis(self.aof_flush_interval_ms.max(1)),
            rewrite_percentage: self.aof_rewrite_percentage,
            rewrite_min_size: self.aof_rewrite_min_size,
            check_interval: Duration::from_millis(self.aof_check_interval_ms.max(1)),
        }
    }

    pub fn expiry_settings(&self) -> ExpirySettings {
        ExpirySettings {
            interval: Duration::from_millis(self.expire_interval_ms.max(1)),
            sample_size: self.expire_sample_size.max(1),
            max_iterations: self.expire_max_iterations.max(1),
        }
    }
}
