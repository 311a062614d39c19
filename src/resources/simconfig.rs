//! Simulation configuration.
//!
//! Holds the physical constants and server settings supplied at startup.
//! Defaults are safe to run with; an INI file can override any subset of
//! them. The core treats the loaded values as immutable for its lifetime.
//!
//! # Configuration File Format
//!
//! ```ini
//! [physics]
//! step = 250
//! gravity = 6.674e-11
//! materiality_mass = 9.39e20
//!
//! [actions]
//! proximity = 2000
//! workers = 4
//! lock_timeout_ms = 0
//!
//! [storage]
//! ship_capacity = 10
//!
//! [server]
//! host = 127.0.0.1
//! port = 3000
//! server_id =
//! auto_claim = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use configparser::ini::Ini;
use log::info;

use crate::resources::simclock::SimTime;

/// Default safe values for startup
const DEFAULT_STEP: SimTime = 250;
const DEFAULT_GRAVITY: f64 = 6.674e-11;
/// Mass of a Ceres-class minor planet.
const DEFAULT_MATERIALITY_MASS: f64 = 9.39e20;
const DEFAULT_PROXIMITY: f64 = 2000.0;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 0;
const DEFAULT_SHIP_CAPACITY: usize = 10;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_AUTO_CLAIM: bool = true;
const DEFAULT_CONFIG_PATH: &str = "./starhold.ini";

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Fixed integration step (Δ) in time units.
    pub step: SimTime,
    /// Gravitational constant G.
    pub gravity: f64,
    /// Minimum mass for a body to be listed as a gravity influence.
    pub materiality_mass: f64,
    /// Maximum distance for a resource transfer.
    pub proximity: f64,
    /// Number of dispatcher worker threads.
    pub workers: usize,
    /// Bounded wait for exclusive entity access; 0 waits forever.
    pub lock_timeout_ms: u64,
    /// Default storage capacity of ships.
    pub ship_capacity: usize,
    pub host: String,
    pub port: u16,
    /// Identity of this server in the session directory. Generated when empty.
    pub server_id: Option<String>,
    /// Claim unknown clients for this server on first contact.
    pub auto_claim: bool,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimConfig {
    /// Create a configuration with safe default values.
    pub fn new() -> Self {
        Self {
            step: DEFAULT_STEP,
            gravity: DEFAULT_GRAVITY,
            materiality_mass: DEFAULT_MATERIALITY_MASS,
            proximity: DEFAULT_PROXIMITY,
            workers: DEFAULT_WORKERS,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            ship_capacity: DEFAULT_SHIP_CAPACITY,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            server_id: None,
            auto_claim: DEFAULT_AUTO_CLAIM,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;
        self.apply(&config)
    }

    /// Load configuration from INI text. Used by tests and embedded defaults.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        self.apply(&config)
    }

    fn apply(&mut self, config: &Ini) -> Result<(), String> {
        // [physics] section
        if let Some(step) = config.getuint("physics", "step")? {
            self.step = step;
        }
        if let Some(gravity) = config.getfloat("physics", "gravity")? {
            self.gravity = gravity;
        }
        if let Some(mass) = config.getfloat("physics", "materiality_mass")? {
            self.materiality_mass = mass;
        }

        // [actions] section
        if let Some(proximity) = config.getfloat("actions", "proximity")? {
            self.proximity = proximity;
        }
        if let Some(workers) = config.getuint("actions", "workers")? {
            self.workers = workers as usize;
        }
        if let Some(timeout) = config.getuint("actions", "lock_timeout_ms")? {
            self.lock_timeout_ms = timeout;
        }

        // [storage] section
        if let Some(capacity) = config.getuint("storage", "ship_capacity")? {
            self.ship_capacity = capacity as usize;
        }

        // [server] section
        if let Some(host) = config.get("server", "host").filter(|h| !h.is_empty()) {
            self.host = host;
        }
        if let Some(port) = config.getuint("server", "port")? {
            self.port = u16::try_from(port).map_err(|_| format!("port {} out of range", port))?;
        }
        if let Some(id) = config.get("server", "server_id") {
            self.server_id = if id.trim().is_empty() {
                None
            } else {
                Some(id.trim().to_string())
            };
        }
        if let Some(auto_claim) = config.getbool("server", "auto_claim")? {
            self.auto_claim = auto_claim;
        }

        self.validate()?;

        info!(
            "Loaded config: step={}, G={:e}, materiality={:e}, proximity={}, workers={}, lock_timeout_ms={}, listen={}:{}",
            self.step,
            self.gravity,
            self.materiality_mass,
            self.proximity,
            self.workers,
            self.lock_timeout_ms,
            self.host,
            self.port
        );

        Ok(())
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.step == 0 {
            return Err("physics.step must be positive".into());
        }
        if !self.gravity.is_finite() || self.gravity < 0.0 {
            return Err(format!("physics.gravity must be finite and >= 0, got {}", self.gravity));
        }
        if !self.materiality_mass.is_finite() || self.materiality_mass < 0.0 {
            return Err(format!(
                "physics.materiality_mass must be finite and >= 0, got {}",
                self.materiality_mass
            ));
        }
        if !self.proximity.is_finite() || self.proximity < 0.0 {
            return Err(format!(
                "actions.proximity must be finite and >= 0, got {}",
                self.proximity
            ));
        }
        if self.workers == 0 {
            return Err("actions.workers must be at least 1".into());
        }
        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        config.set("physics", "step", Some(self.step.to_string()));
        config.set("physics", "gravity", Some(format!("{:e}", self.gravity)));
        config.set(
            "physics",
            "materiality_mass",
            Some(format!("{:e}", self.materiality_mass)),
        );

        config.set("actions", "proximity", Some(self.proximity.to_string()));
        config.set("actions", "workers", Some(self.workers.to_string()));
        config.set(
            "actions",
            "lock_timeout_ms",
            Some(self.lock_timeout_ms.to_string()),
        );

        config.set("storage", "ship_capacity", Some(self.ship_capacity.to_string()));

        config.set("server", "host", Some(self.host.clone()));
        config.set("server", "port", Some(self.port.to_string()));
        config.set(
            "server",
            "server_id",
            Some(self.server_id.clone().unwrap_or_default()),
        );
        config.set("server", "auto_claim", Some(self.auto_claim.to_string()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }

    /// Bounded wait for entity access, `None` when unbounded.
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }

    /// Address the TCP transport binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::new();
        assert_eq!(config.step, 250);
        assert_eq!(config.proximity, 2000.0);
        assert_eq!(config.ship_capacity, 10);
        assert!(config.lock_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut config = SimConfig::new();
        config
            .load_from_str("[physics]\nstep = 100\n\n[actions]\nproximity = 500.5\n")
            .unwrap();
        assert_eq!(config.step, 100);
        assert_eq!(config.proximity, 500.5);
        assert_eq!(config.gravity, DEFAULT_GRAVITY);
        assert_eq!(config.workers, DEFAULT_WORKERS);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_server_section() {
        let mut config = SimConfig::new();
        config
            .load_from_str(
                "[server]\nhost = 0.0.0.0\nport = 4100\nserver_id = alpha\nauto_claim = false\n\n[actions]\nlock_timeout_ms = 1500\n",
            )
            .unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:4100");
        assert_eq!(config.server_id.as_deref(), Some("alpha"));
        assert!(!config.auto_claim);
        assert_eq!(config.lock_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let mut config = SimConfig::new();
        assert!(config.load_from_str("[physics]\nstep = 0\n").is_err());
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let mut config = SimConfig::new();
        assert!(config.load_from_str("[actions]\nworkers = 0\n").is_err());
    }

    #[test]
    fn test_garbage_number_is_error() {
        let mut config = SimConfig::new();
        assert!(config.load_from_str("[physics]\nstep = soon\n").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let mut config = SimConfig::with_path("/nonexistent/starhold.ini");
        assert!(config.load_from_file().is_err());
        assert_eq!(config, SimConfig::with_path("/nonexistent/starhold.ini"));
    }
}
