use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

// rendition concurrency gate
//
// a fixed-capacity, non-queueing counting gate: callers that find it full
// get an immediate refusal rather than a wait, and surface that to the
// client as a retryable overload.  it lives in the application state and is
// handed to handlers by injection, not kept as module-global mutable state.
//
// this is deliberately not a scheduler; there is no priority, fairness, or
// starvation protection
#[derive(Clone, Debug)]
pub struct RenditionGate {
    capacity: usize,
    sem: Arc<Semaphore>,
}

// raii slot; dropping it releases the gate on every exit path, including
// early returns and panics inside the rendition branch
#[derive(Debug)]
pub struct RenditionPermit {
    _permit: OwnedSemaphorePermit,
}

impl RenditionGate {
    pub fn new(capacity: usize) -> Self {
        RenditionGate {
            capacity,
            sem: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn try_acquire(&self) -> Option<RenditionPermit> {
        match self.sem.clone().try_acquire_owned() {
            Ok(permit) => Some(RenditionPermit { _permit: permit }),
            Err(_) => None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}
