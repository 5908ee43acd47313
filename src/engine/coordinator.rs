//! The optimization coordinator: the training thread's view of the system.
//!
//! ```text
//!   training thread            worker threads              subprocess
//!   ───────────────            ──────────────              ──────────
//!   select_next_state ◀─bridge─ step handler ◀─────TCP───── step~<n>
//!   process_results   ──────────reply worker ──────TCP────▶ step~{json}
//!   finish_optimization ─▶ teardown + CSV export
//! ```
//!
//! All training state (cache, tables, counters, RNG) lives on the training
//! thread and is mutated only between `wait_next` calls. The handlers share
//! nothing with it beyond the bridge sender, the `finished` flag and the
//! read-only state space.

use std::fs;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{Transition, TransitionCache};
use crate::engine::bridge::{StepBridge, StepEvent, StepSender};
use crate::engine::config::EngineConfig;
use crate::engine::tables::{HistoryTable, QTable, VisitCounter};
use crate::error::{Error, Result};
use crate::net::{EventServer, Worker};
use crate::protocol::channel;
use crate::space::StateSpace;
use crate::subprocess::SubprocessLauncher;

/// Advertised on `state_space` right after the peer connects.
#[derive(Debug, Serialize, Deserialize)]
pub struct SpaceDescription {
    pub num_of_states: usize,
    pub num_of_actions: usize,
    pub shape_of_states: Vec<usize>,
    pub shape_of_actions: Vec<usize>,
    pub state_bounds: Vec<(f64, f64)>,
}

impl SpaceDescription {
    fn from_space(space: &StateSpace) -> Self {
        Self {
            num_of_states: space.num_states(),
            num_of_actions: space.num_actions(),
            shape_of_states: space.shape_of_states(),
            shape_of_actions: space.shape_of_actions(),
            state_bounds: space.state_bounds(),
        }
    }
}

/// The one reply sent per inbound `step` frame.
#[derive(Debug, Serialize, Deserialize)]
pub struct StepReply {
    pub reward: f64,
    pub obs: Vec<f64>,
    pub done: bool,
}

/// Runs one optimization: owns the server, the subprocess and all tables.
pub struct Engine {
    space: Arc<StateSpace>,
    config: EngineConfig,

    server: Option<EventServer>,
    launcher: Option<SubprocessLauncher>,
    connected: bool,

    bridge: StepBridge,
    sender: StepSender,
    finished: Arc<AtomicBool>,
    episodes: Arc<AtomicUsize>,

    cache: TransitionCache,
    qtable: QTable,
    history: HistoryTable,
    visits: VisitCounter,
    rng: StdRng,

    cur_state: usize,
    cur_action: usize,
    replied: bool,
    reply_to: Option<Worker>,
    steps: usize,
}

impl Engine {
    pub fn new(space: StateSpace, config: EngineConfig) -> Self {
        let space = Arc::new(space);
        let max_visits = config
            .max_visits
            .unwrap_or(space.num_actions() as u32);
        let cur_state = space
            .state_id(&space.default_state())
            .expect("default state is inside its own space");
        let (sender, bridge) = StepBridge::channel();
        let qtable = QTable::new(space.num_states(), space.num_actions());
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            space,
            server: None,
            launcher: None,
            connected: false,
            bridge,
            sender,
            finished: Arc::new(AtomicBool::new(false)),
            episodes: Arc::new(AtomicUsize::new(0)),
            cache: TransitionCache::new(),
            qtable,
            history: HistoryTable::new(),
            visits: VisitCounter::new(max_visits),
            rng,
            cur_state,
            cur_action: 0,
            replied: false,
            reply_to: None,
            steps: 0,
            config,
        }
    }

    /// Bind the event server and register the channel handlers. Idempotent;
    /// called lazily from [`Engine::select_next_state`] but exposed so tests
    /// and embedders can learn the address before the first step.
    pub fn bind(&mut self) -> Result<()> {
        if self.server.is_some() {
            return Ok(());
        }
        let server = EventServer::bind(self.config.bind_addr)?;
        self.register_handlers(&server);
        info!(addr = %server.local_addr()?, "event server bound");
        self.server = Some(server);
        Ok(())
    }

    /// The address the event server listens on. Fails before [`Engine::bind`].
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.server()?.local_addr()?)
    }

    /// Number of `reset` frames answered so far.
    pub fn episodes(&self) -> usize {
        self.episodes.load(Ordering::SeqCst)
    }

    /// Number of completed steps (one per answered `step` frame).
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Dense index of the state the run currently sits in.
    pub fn current_state(&self) -> usize {
        self.cur_state
    }

    fn server(&self) -> Result<&EventServer> {
        self.server.as_ref().ok_or_else(|| {
            Error::SocketFailure(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "event server not bound",
            ))
        })
    }

    fn register_handlers(&self, server: &EventServer) {
        {
            let space = Arc::clone(&self.space);
            server.on(channel::CONNECT, move |event| {
                let description = SpaceDescription::from_space(&space);
                let json = serde_json::to_string(&description)
                    .expect("space description serializes");
                event.reply(channel::STATE_SPACE, Some(&json));
            });
        }
        {
            let space = Arc::clone(&self.space);
            let episodes = Arc::clone(&self.episodes);
            server.on(channel::RESET, move |event| {
                episodes.fetch_add(1, Ordering::SeqCst);
                let values = space.default_state_values();
                let json =
                    serde_json::to_string(&values).expect("state values serialize");
                event.reply(channel::RESET, Some(&json));
            });
        }
        {
            let sender = self.sender.clone();
            server.on(channel::STEP, move |event| {
                sender.push(StepEvent::Step(event));
            });
        }
        {
            let sender = self.sender.clone();
            let finished = Arc::clone(&self.finished);
            server.on(channel::DISCONNECT, move |_| {
                finished.store(true, Ordering::SeqCst);
                sender.push(StepEvent::Disconnected);
            });
        }
        server.on(channel::ISSUE, |event| {
            warn!(peer = %event.worker.peer(), issue = event.payload_str(), "peer reported an issue");
        });
        server.on(channel::DEBUG, |event| {
            info!(peer = %event.worker.peer(), message = event.payload_str(), "peer debug");
        });
    }

    /// Spawn the configured environment script, if any.
    fn launch_subprocess(&mut self) -> Result<()> {
        let Some(script) = self.config.script.clone() else {
            return Ok(());
        };
        let mut launcher = SubprocessLauncher::new(
            &self.config.save_dir,
            script,
            self.config.interpreter.clone(),
        )?;
        launcher.run(self.local_addr()?)?;
        self.launcher = Some(launcher);
        Ok(())
    }

    /// Bind, launch the configured subprocess and accept its connection.
    /// Each part runs at most once per (re)start.
    fn ensure_started(&mut self) -> Result<()> {
        self.bind()?;
        if self.launcher.is_none() {
            self.launch_subprocess()?;
        }
        if !self.connected {
            self.server()?.wait_for_connection()?;
            self.connected = true;
        }
        Ok(())
    }

    /// Wait for the subprocess's next action choice.
    ///
    /// Lazily starts server and subprocess on the first call. Returns the
    /// dense index of the current state paired with the chosen action index.
    pub fn select_next_state(&mut self) -> Result<(usize, usize)> {
        self.ensure_started()?;
        self.replied = false;

        let event = match self.bridge.wait_next(self.config.step_timeout)? {
            StepEvent::Step(event) => event,
            StepEvent::Disconnected => return Err(Error::Disconnected),
        };

        let payload = event.payload_str();
        let action: usize = payload
            .trim()
            .parse()
            .map_err(|_| Error::MalformedFrame(payload.to_string()))?;
        if action >= self.space.num_actions() {
            return Err(Error::MalformedFrame(payload.to_string()));
        }

        self.reply_to = Some(event.worker);
        self.cur_action = action;
        debug!(state = self.cur_state, action, "step requested");
        Ok((self.cur_state, self.cur_action))
    }

    /// Record one reported transition; on the first report of the step,
    /// consume a cached transition and answer the subprocess.
    ///
    /// Every call caches the transition under the current (state, action)
    /// key. Only the first call after [`Engine::select_next_state`] draws from
    /// the cache, updates the value table, history and visit counter, and
    /// sends the single `step` reply. Later calls within the same step only
    /// grow the cache.
    pub fn process_results(
        &mut self,
        old_state: &[usize],
        action: &[usize],
        new_state: &[usize],
        probability: f64,
        score: f64,
    ) -> Result<()> {
        self.cache.add(
            self.cur_state,
            self.cur_action,
            Transition {
                old_state: old_state.to_vec(),
                action: action.to_vec(),
                new_state: new_state.to_vec(),
                probability,
                score,
            },
        );
        if self.replied {
            return Ok(());
        }

        let drawn = self
            .cache
            .choose_one(self.cur_state, self.cur_action, &mut self.rng)?
            .clone();
        let old_id = self
            .space
            .state_id(&drawn.old_state)
            .ok_or_else(|| Error::UnknownPoint(drawn.old_state.clone()))?;
        let new_id = self
            .space
            .state_id(&drawn.new_state)
            .ok_or_else(|| Error::UnknownPoint(drawn.new_state.clone()))?;
        let action_id = self
            .space
            .action_id(&drawn.action)
            .ok_or_else(|| Error::UnknownPoint(drawn.action.clone()))?;

        self.qtable.set(old_id, self.cur_action, drawn.score);
        self.visits.record((new_id, action_id));
        if self.visits.reached_max((new_id, action_id)) {
            info!(state = new_id, action = action_id, "visit threshold reached");
            self.finished.store(true, Ordering::SeqCst);
        }
        self.cur_action = action_id;
        self.history
            .push(old_id, action_id, new_id, drawn.probability, drawn.score);

        let reply = StepReply {
            reward: drawn.score,
            obs: self.space.state_values(&drawn.new_state),
            done: self.finished.load(Ordering::SeqCst),
        };
        let json = serde_json::to_string(&reply).expect("step reply serializes");
        if let Some(worker) = &self.reply_to {
            worker.send(channel::STEP, Some(&json));
        }
        self.replied = true;
        self.steps += 1;
        Ok(())
    }

    /// Whether the run should keep stepping.
    pub fn continue_iterating(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    /// Flag termination, tear the subprocess and server down and export the
    /// value table and history as CSV into the save directory.
    pub fn finish_optimization(&mut self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        self.teardown();

        fs::create_dir_all(&self.config.save_dir)?;
        self.qtable
            .write_csv(self.config.save_dir.join("qtable.csv"), &self.space)?;
        self.history
            .write_csv(self.config.save_dir.join("history.csv"), &self.space)?;
        info!(save_dir = %self.config.save_dir.display(), "optimization finished");
        Ok(())
    }

    /// Discard the run's progress and restart server and subprocess.
    ///
    /// The value table and history persist across episodes; the transition
    /// cache, visit counts, termination flag and step/episode counters do
    /// not. The accepted connection is re-established on the next
    /// [`Engine::select_next_state`].
    pub fn reset(&mut self) -> Result<()> {
        self.teardown();

        // Fresh bridge, flag and counter per server generation. The old
        // workers' reader threads may still dispatch a late $DISCONNECT after
        // destroy(); their handlers hold the previous Arcs and so cannot flip
        // the new run's termination flag or bump its episode count.
        let (sender, bridge) = StepBridge::channel();
        self.sender = sender;
        self.bridge = bridge;
        self.finished = Arc::new(AtomicBool::new(false));
        self.episodes = Arc::new(AtomicUsize::new(0));
        self.cache.clear();
        self.visits.reset();
        self.replied = false;
        self.reply_to = None;
        self.steps = 0;
        self.cur_state = self
            .space
            .state_id(&self.space.default_state())
            .expect("default state is inside its own space");
        self.cur_action = 0;

        self.bind()?;
        self.launch_subprocess()?;
        Ok(())
    }

    /// The learned policy: best action and value per state index.
    ///
    /// Fails with [`Error::PrematureInvocation`] while the optimization is
    /// still running.
    pub fn get_results(&self) -> Result<std::collections::BTreeMap<usize, (usize, f64)>> {
        if !self.finished.load(Ordering::SeqCst) {
            return Err(Error::PrematureInvocation);
        }
        Ok(self.qtable.optimal_policy())
    }

    /// Teardown order: stop accepting, close workers, kill the subprocess.
    fn teardown(&mut self) {
        if let Some(server) = self.server.take() {
            server.destroy();
        }
        self.connected = false;
        if let Some(mut launcher) = self.launcher.take() {
            launcher.destroy();
        }
        self.reply_to = None;
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}
