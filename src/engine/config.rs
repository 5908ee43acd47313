//! Engine configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Tunable knobs of one optimization run.
///
/// `Default` gives a loopback ephemeral-port bind, a fixed seed for
/// reproducible draws, no subprocess script (the environment is expected to
/// connect on its own, as the tests do) and no step timeout.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for exported tables, subprocess logs and the shell launcher.
    pub save_dir: PathBuf,
    /// Address the event server binds. Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,
    /// Interpreter for the environment script; `python3` when unset.
    pub interpreter: Option<PathBuf>,
    /// Environment script to wrap and launch. When unset no subprocess is
    /// spawned and the peer must connect by itself.
    pub script: Option<PathBuf>,
    /// Visit count at which a transition flags termination. Defaults to the
    /// number of actions when unset.
    pub max_visits: Option<u32>,
    /// Seed for the weighted draws.
    pub seed: u64,
    /// How long to wait for the next `step` frame before failing the step.
    /// `None` waits forever.
    pub step_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("envlink_out"),
            bind_addr: "127.0.0.1:0".parse().expect("loopback address parses"),
            interpreter: None,
            script: None,
            max_visits: None,
            seed: 42,
            step_timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn with_save_dir(mut self, save_dir: impl Into<PathBuf>) -> Self {
        self.save_dir = save_dir.into();
        self
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_max_visits(mut self, max_visits: u32) -> Self {
        self.max_visits = Some(max_visits);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.bind_addr.port(), 0);
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(config.seed, 42);
        assert!(config.script.is_none());
        assert!(config.step_timeout.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = EngineConfig::default()
            .with_save_dir("/tmp/run")
            .with_seed(7)
            .with_max_visits(12)
            .with_step_timeout(Duration::from_secs(3));
        assert_eq!(config.save_dir, PathBuf::from("/tmp/run"));
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_visits, Some(12));
        assert_eq!(config.step_timeout, Some(Duration::from_secs(3)));
    }
}
