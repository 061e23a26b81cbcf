use super::remote::RemoteWorker;
use logauge_tonic_core::{Error, Result, types::WorkerId};

/// Workers of one run, indexed by id.
///
/// Append-only: ids are handed out in arrival order starting at 0 and never
/// reused. Registrations beyond the capacity are rejected.
pub struct WorkerRegistry<W> {
    capacity: WorkerId,
    workers: Vec<W>,
}

impl<W: RemoteWorker> WorkerRegistry<W> {
    pub fn new(capacity: WorkerId) -> Self {
        Self {
            capacity,
            workers: Vec::with_capacity(capacity as usize),
        }
    }

    /// Stores `handle` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registration`] when the endpoint is empty or the
    /// registry is full. The registry is left unchanged.
    pub fn register(&mut self, handle: W) -> Result<WorkerId> {
        if handle.endpoint().trim().is_empty() {
            return Err(Error::Registration {
                reason: "empty worker endpoint".to_string(),
            });
        }
        if self.is_full() {
            return Err(Error::Registration {
                reason: format!(
                    "registry is full ({} workers), ignoring {}",
                    self.capacity,
                    handle.endpoint()
                ),
            });
        }
        let worker_id = self.len();
        self.workers.push(handle);
        Ok(worker_id)
    }

    pub fn get(&self, worker_id: WorkerId) -> Option<&W> {
        self.workers.get(worker_id as usize)
    }

    pub fn len(&self) -> WorkerId {
        self.workers.len() as WorkerId
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub const fn capacity(&self) -> WorkerId {
        self.capacity
    }

    /// Workers in id order.
    pub fn iter(&self) -> impl Iterator<Item = (WorkerId, &W)> {
        self.workers
            .iter()
            .enumerate()
            .map(|(i, w)| (i as WorkerId, w))
    }
}
