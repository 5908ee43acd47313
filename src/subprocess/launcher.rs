//! Launches and supervises the environment subprocess.

use std::fs::{self, File};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::subprocess::template::WrapperTemplate;

/// Name of the generated wrapper, placed next to the user script.
const WRAPPER_FILE: &str = ".__envlink_runner__.py";

/// Name of the generated shell launcher, placed in the save directory.
const RUNNER_FILE: &str = "runner.sh";

/// The shell launcher. The indirection lets the interpreter start under its
/// normal environment activation so third-party packages resolve for the
/// child, and keeps the spawn command identical across interpreters.
const RUNNER_SH: &str = "\
#!/bin/sh
# usage: runner.sh <interpreter> <wrapper.py> <host:port>
PY=\"$1\"
shift
exec \"$PY\" \"$@\"
";

/// Builds the runnable wrapper around a user script and supervises the
/// resulting child process.
///
/// The wrapper and launcher files are left on disk after execution for
/// postmortem inspection; they are not cleaned up automatically.
pub struct SubprocessLauncher {
    interpreter: Option<PathBuf>,
    wrapper: PathBuf,
    runner: PathBuf,
    save_dir: PathBuf,
    child: Option<Child>,
}

impl SubprocessLauncher {
    /// Generate the wrapper and shell launcher for `script`.
    ///
    /// The wrapper lands next to the user script so its relative imports and
    /// data files keep resolving; the launcher and the child's output files
    /// land in `save_dir`.
    pub fn new(
        save_dir: impl AsRef<Path>,
        script: impl AsRef<Path>,
        interpreter: Option<PathBuf>,
    ) -> Result<Self> {
        let save_dir = save_dir.as_ref().to_path_buf();
        let script = script.as_ref();
        fs::create_dir_all(&save_dir)?;

        let user_source = fs::read_to_string(script)?;
        let rendered = WrapperTemplate::default().render(&user_source);
        let wrapper = script
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(WRAPPER_FILE);
        fs::write(&wrapper, rendered)?;

        let runner = save_dir.join(RUNNER_FILE);
        fs::write(&runner, RUNNER_SH)?;

        debug!(wrapper = %wrapper.display(), runner = %runner.display(), "generated subprocess wrapper");
        Ok(Self {
            interpreter,
            wrapper,
            runner,
            save_dir,
            child: None,
        })
    }

    /// Path of the generated wrapper script.
    pub fn wrapper_path(&self) -> &Path {
        &self.wrapper
    }

    /// Whether a child process has been spawned and not yet destroyed.
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Spawn the wrapper, telling it where the event server listens.
    ///
    /// The child's stdout and stderr are redirected to `stdout.log` and
    /// `stderr.log` in the save directory rather than inherited.
    pub fn run(&mut self, addr: SocketAddr) -> Result<()> {
        let interpreter = self
            .interpreter
            .clone()
            .unwrap_or_else(|| PathBuf::from("python3"));
        let stdout = File::create(self.save_dir.join("stdout.log"))?;
        let stderr = File::create(self.save_dir.join("stderr.log"))?;

        let child = Command::new("sh")
            .arg(&self.runner)
            .arg(&interpreter)
            .arg(&self.wrapper)
            .arg(addr.to_string())
            .env("ENVLINK_ADDR", addr.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()?;
        info!(pid = child.id(), interpreter = %interpreter.display(), "environment subprocess started");
        self.child = Some(child);
        Ok(())
    }

    /// Idempotently request termination of the child process.
    ///
    /// Safe to call when `run` never succeeded; a no-op without a live child.
    pub fn destroy(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                warn!(%err, "failed to kill environment subprocess");
            }
            let _ = child.wait();
            debug!("environment subprocess terminated");
        }
    }
}

impl Drop for SubprocessLauncher {
    fn drop(&mut self) {
        self.destroy();
    }
}
