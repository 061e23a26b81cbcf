use super::{agent::WorkerAgent, request::WorkRequest};
use core::time::Duration;
use logauge_tonic_core::types::Phase;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Worker task processing [`WorkRequest`]s one at a time.
///
/// The task owns the [`WorkerAgent`], so phases never overlap. It runs until
/// the request channel closes or `shutdown` is cancelled. A terminate request
/// is answered first; `shutdown` is cancelled `grace` later so the reply
/// reaches the controller.
pub async fn worker_loop(
    mut rx: mpsc::Receiver<WorkRequest>,
    mut agent: WorkerAgent,
    shutdown: CancellationToken,
    grace: Duration,
) {
    tracing::trace!("Worker task started");

    loop {
        let work = tokio::select! {
            () = shutdown.cancelled() => break,
            work = rx.recv() => work,
        };
        let Some(work) = work else {
            break;
        };

        match work {
            WorkRequest::SetId {
                worker_id,
                response,
            } => {
                agent.set_id(worker_id);
                if response.send(Ok(())).is_err() {
                    tracing::warn!("Caller went away before set_id completed");
                }
            }
            WorkRequest::Phase {
                phase,
                payload,
                response,
            } => {
                if !payload.is_empty() {
                    tracing::debug!("Ignoring payload for {phase}: {payload:?}");
                }
                tracing::info!("Running {phase}");
                let result = match phase {
                    Phase::Initialize => agent.initialize(),
                    Phase::Gendata => agent.gendata().await,
                    Phase::Forward => agent.forward().await,
                    Phase::Terminate => Ok(agent.terminate()),
                };
                match &result {
                    Ok(report) => tracing::info!("{phase} finished: {report}"),
                    Err(e) => tracing::error!("{phase} failed: {e}"),
                }
                if response.send(result).is_err() {
                    tracing::warn!("Caller went away before {phase} completed");
                }

                if phase == Phase::Terminate {
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(grace).await;
                        shutdown.cancel();
                    });
                }
            }
        }
    }

    tracing::trace!("Worker task stopped");
}
