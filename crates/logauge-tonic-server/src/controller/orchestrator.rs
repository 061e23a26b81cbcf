//! The run state machine.
//!
//! ```text
//! AwaitingWorkers -> Initialize -> Generate -> Forward -> Collect -> Terminate -> Done
//!                         \------------\------------\---------\-----> Aborted
//! ```
//!
//! The orchestrator runs as a single task that owns the [`WorkerRegistry`].
//! Registrations reach it over a channel fed by the gRPC handlers. Every phase
//! is broadcast to all workers at once and gathered with `join_all`; the next
//! phase only starts once every call of the previous one has settled. Any
//! failed call aborts the run.

use super::{registry::WorkerRegistry, remote::RemoteWorker, results::ResultsSink};
use crate::{
    config::ControllerConfig,
    telemetry::{
        increment_phase_failures, increment_phases_completed, increment_registrations_rejected,
        increment_workers_registered, record_phase_duration,
    },
};
use core::{fmt, time::Duration};
use futures::future::join_all;
use logauge_tonic_core::{
    Error, Result,
    types::{Phase, WorkerFailure, WorkerId},
};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A worker asking to join the run. `reply` receives whether it was
/// accepted.
pub struct Registration<W> {
    pub handle: W,
    pub reply: oneshot::Sender<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    AwaitingWorkers,
    Initialize,
    Generate,
    Forward,
    Collect,
    Terminate,
    Done,
    Aborted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Settled result of one call of a broadcast.
#[derive(Debug)]
pub struct PhaseOutcome {
    pub worker_id: WorkerId,
    pub result: Result<String>,
}

pub struct Orchestrator<W, S> {
    registry: WorkerRegistry<W>,
    sink: S,
    state: RunState,
    phase_timeout: Option<Duration>,
    shutdown_grace: Duration,
    shutdown: CancellationToken,
}

impl<W: RemoteWorker, S: ResultsSink> Orchestrator<W, S> {
    /// `shutdown` is cancelled when the run ends, either after the terminate
    /// grace delay or right away on abort.
    pub fn new(config: &ControllerConfig, sink: S, shutdown: CancellationToken) -> Self {
        Self {
            registry: WorkerRegistry::new(config.num_workers),
            sink,
            state: RunState::AwaitingWorkers,
            phase_timeout: config.phase_timeout,
            shutdown_grace: config.shutdown_grace,
            shutdown,
        }
    }

    pub const fn state(&self) -> RunState {
        self.state
    }

    pub const fn registry(&self) -> &WorkerRegistry<W> {
        &self.registry
    }

    /// Adds a worker, assigns its id and tells the worker about it.
    ///
    /// Rejected registrations are logged and leave the run untouched. A
    /// failed id notification is logged only; the worker stays registered
    /// and the first phase call surfaces the problem.
    pub async fn register_worker(&mut self, handle: W) -> Result<WorkerId> {
        let endpoint = handle.endpoint().to_string();
        let worker_id = match self.registry.register(handle) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Ignoring registration from {endpoint:?}: {e}");
                increment_registrations_rejected();
                return Err(e);
            }
        };
        increment_workers_registered();
        tracing::info!(
            "Registered worker={worker_id} at {endpoint} ({}/{})",
            self.registry.len(),
            self.registry.capacity()
        );

        if let Some(worker) = self.registry.get(worker_id) {
            if let Err(e) = worker.set_id(worker_id).await {
                tracing::error!("Failed to notify worker={worker_id} of its id: {e}");
            }
        }

        if self.registry.is_full() {
            self.transition(RunState::Initialize);
        }
        Ok(worker_id)
    }

    /// Consumes registrations until the registry is full.
    pub async fn await_workers(
        &mut self,
        registrations: &mut mpsc::Receiver<Registration<W>>,
    ) -> Result<()> {
        tracing::info!(
            "Waiting for {} worker(s) to register",
            self.registry.capacity()
        );
        while !self.registry.is_full() {
            let registration = tokio::select! {
                () = self.shutdown.cancelled() => return Err(Error::ServiceShutdown),
                registration = registrations.recv() => registration,
            };
            let Some(Registration { handle, reply }) = registration else {
                return Err(Error::ChannelError {
                    context: "registration channel closed".to_string(),
                });
            };
            let accepted = self.register_worker(handle).await.is_ok();
            if reply.send(accepted).is_err() {
                tracing::debug!("Registration caller went away before the reply");
            }
        }
        Ok(())
    }

    /// Drives the whole run and hands back the results sink.
    ///
    /// The registration channel is closed as soon as the registry is full,
    /// so later `acceptWorker` calls are refused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseFailed`] naming every failing worker when a
    /// phase fails. The run is then aborted: no further phase (terminate
    /// included) is issued and the shutdown token is cancelled immediately.
    pub async fn run(mut self, mut registrations: mpsc::Receiver<Registration<W>>) -> Result<S> {
        let registered = self.await_workers(&mut registrations).await;
        registrations.close();
        while let Ok(Registration { handle, reply }) = registrations.try_recv() {
            tracing::warn!("Ignoring late registration from {:?}", handle.endpoint());
            increment_registrations_rejected();
            let _ = reply.send(false);
        }
        drop(registrations);
        if let Err(e) = registered {
            return Err(self.abort(e));
        }

        match self.run_phases().await {
            Ok(()) => {
                self.terminate().await;
                self.transition(RunState::Done);
                Ok(self.sink)
            }
            Err(e) => Err(self.abort(e)),
        }
    }

    async fn run_phases(&mut self) -> Result<()> {
        let outcomes = self.broadcast(Phase::Initialize, "").await;
        self.evaluate_phase(Phase::Initialize, outcomes)?;

        self.transition(RunState::Generate);
        let outcomes = self.broadcast(Phase::Gendata, "").await;
        self.evaluate_phase(Phase::Gendata, outcomes)?;

        self.transition(RunState::Forward);
        let outcomes = self.broadcast(Phase::Forward, "").await;

        self.transition(RunState::Collect);
        self.evaluate_phase(Phase::Forward, outcomes)
    }

    /// Calls `phase` on every worker concurrently and waits for all calls to
    /// settle. Outcomes come back in worker id order.
    pub async fn broadcast(&self, phase: Phase, payload: &str) -> Vec<PhaseOutcome> {
        tracing::info!(
            "Broadcasting {phase} to {} worker(s)",
            self.registry.len()
        );
        let started = Instant::now();
        let calls = self.registry.iter().map(|(worker_id, worker)| async move {
            let result = self
                .settle(async {
                    match phase {
                        Phase::Terminate => worker.terminate().await,
                        _ => worker.run_phase(phase, payload).await,
                    }
                })
                .await;
            PhaseOutcome { worker_id, result }
        });
        let outcomes = join_all(calls).await;
        record_phase_duration(phase.as_str(), started.elapsed().as_millis() as f64);
        outcomes
    }

    async fn settle(&self, call: impl Future<Output = Result<String>>) -> Result<String> {
        match self.phase_timeout {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .unwrap_or_else(|_| Err(Error::Timeout { after })),
            None => call.await,
        }
    }

    /// Persists the outcomes of a successful phase, or fails with every
    /// failing worker.
    pub fn evaluate_phase(&mut self, phase: Phase, outcomes: Vec<PhaseOutcome>) -> Result<()> {
        let mut reports = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for PhaseOutcome { worker_id, result } in outcomes {
            match result {
                Ok(report) => reports.push((worker_id, report)),
                Err(e) => failures.push(WorkerFailure {
                    worker_id,
                    message: e.to_string(),
                }),
            }
        }

        if !failures.is_empty() {
            increment_phase_failures(phase.as_str(), failures.len() as u64);
            for failure in &failures {
                tracing::error!("Phase {phase} failed on {failure}");
            }
            return Err(Error::PhaseFailed {
                phase: phase.to_string(),
                failures,
            });
        }

        tracing::info!("Phase {phase} finished on all workers");
        for (worker_id, report) in &reports {
            self.sink.persist(phase, *worker_id, report)?;
        }
        increment_phases_completed(phase.as_str());
        Ok(())
    }

    /// Best effort: failures are logged, then the controller shuts down after
    /// the grace delay.
    async fn terminate(&mut self) {
        self.transition(RunState::Terminate);
        for PhaseOutcome { worker_id, result } in self.broadcast(Phase::Terminate, "").await {
            match result {
                Ok(report) => tracing::info!("{report}"),
                Err(e) => tracing::warn!("Failed to terminate worker={worker_id}: {e}"),
            }
        }
        tokio::time::sleep(self.shutdown_grace).await;
        self.shutdown.cancel();
    }

    fn abort(&mut self, error: Error) -> Error {
        tracing::error!("Aborting run in state {}: {error}", self.state);
        self.transition(RunState::Aborted);
        self.shutdown.cancel();
        error
    }

    fn transition(&mut self, next: RunState) {
        tracing::debug!("Run state {} -> {next}", self.state);
        self.state = next;
    }
}
