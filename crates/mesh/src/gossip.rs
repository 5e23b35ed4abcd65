//! Gossip propagation: bounded, channel-based fan-out of accepted messages.
//!
//! Forwards are queued on a bounded channel and drained by a dispatcher task
//! that runs at most `max_in_flight` deliveries at once. The gossiping node
//! never waits for a neighbor to process a message, but callers can await
//! [`GossipPropagator::wait_idle`] to observe quiescence.

use crate::error::{MeshError, MeshResult};
use chronoflux_core::{NodeId, TemporalMessage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, trace};

/// One message on its way from a node to one of its neighbors.
#[derive(Debug, Clone)]
pub struct Forward {
    pub from: NodeId,
    pub to: NodeId,
    pub message: TemporalMessage,
}

/// Delivery target of the propagator (the transport abstraction).
pub trait ForwardHandler: Send + Sync + 'static {
    fn deliver(&self, forward: Forward);
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn start(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Decrements the in-flight count even if delivery panics.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Bounded worker pool for neighbor forwards.
#[derive(Debug)]
pub struct GossipPropagator {
    tx: mpsc::Sender<Forward>,
    in_flight: Arc<InFlight>,
}

impl GossipPropagator {
    /// Start the dispatcher on the current tokio runtime.
    ///
    /// The handler is held weakly: once it is dropped, queued forwards are
    /// discarded and the dispatcher exits when the channel closes.
    pub fn spawn(
        handler: Weak<dyn ForwardHandler>,
        queue_capacity: usize,
        max_in_flight: usize,
    ) -> MeshResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MeshError::Runtime(e.to_string()))?;
        Ok(Self::spawn_on(&runtime, handler, queue_capacity, max_in_flight))
    }

    /// Start the dispatcher on an explicit runtime.
    pub fn spawn_on(
        runtime: &tokio::runtime::Handle,
        handler: Weak<dyn ForwardHandler>,
        queue_capacity: usize,
        max_in_flight: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Forward>(queue_capacity.max(1));
        let in_flight = Arc::new(InFlight::default());
        let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));

        runtime.spawn({
            let in_flight = Arc::clone(&in_flight);
            async move {
                while let Some(forward) = rx.recv().await {
                    let guard = InFlightGuard(Arc::clone(&in_flight));
                    let Some(handler) = handler.upgrade() else {
                        trace!(to = %forward.to, "Handler gone, discarding forward");
                        continue;
                    };
                    let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                        break;
                    };

                    tokio::spawn(async move {
                        let _guard = guard;
                        let _permit = permit;
                        handler.deliver(forward);
                    });
                }
                debug!("Gossip dispatcher stopped");
            }
        });

        Self { tx, in_flight }
    }

    /// Queue a forward, waiting for space if the queue is full.
    ///
    /// Cancel safe: the forward is only counted once a slot is reserved.
    pub async fn submit(&self, forward: Forward) -> MeshResult<()> {
        let slot = self
            .tx
            .reserve()
            .await
            .map_err(|_| MeshError::PropagatorClosed)?;
        self.in_flight.start();
        slot.send(forward);
        Ok(())
    }

    /// Queue a forward without waiting.
    pub fn try_submit(&self, forward: Forward) -> MeshResult<()> {
        self.in_flight.start();
        match self.tx.try_send(forward) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.in_flight.finish();
                Err(MeshError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => {
                self.in_flight.finish();
                Err(MeshError::PropagatorClosed)
            }
        }
    }

    /// Forwards queued or being delivered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Resolve once every submitted forward has been delivered.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        delivered: Mutex<Vec<NodeId>>,
    }

    impl ForwardHandler for Recorder {
        fn deliver(&self, forward: Forward) {
            self.delivered.lock().unwrap().push(forward.to);
        }
    }

    fn forward(to: &str) -> Forward {
        Forward {
            from: "alpha".to_string(),
            to: to.to_string(),
            message: TemporalMessage::new(0, 0.8, 0.0, vec![], vec![], vec![]),
        }
    }

    #[tokio::test]
    async fn test_delivers_every_forward() {
        let recorder = Arc::new(Recorder::default());
        let handler: Weak<dyn ForwardHandler> = Arc::<Recorder>::downgrade(&recorder);
        let propagator = GossipPropagator::spawn(handler, 4, 2).unwrap();

        for i in 0..20 {
            propagator.submit(forward(&format!("n{i}"))).await.unwrap();
        }
        propagator.wait_idle().await;

        let mut delivered = recorder.delivered.lock().unwrap().clone();
        delivered.sort();
        assert_eq!(delivered.len(), 20);
        assert_eq!(propagator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_empty() {
        let recorder = Arc::new(Recorder::default());
        let handler: Weak<dyn ForwardHandler> = Arc::<Recorder>::downgrade(&recorder);
        let propagator = GossipPropagator::spawn(handler, 4, 2).unwrap();
        tokio::time::timeout(Duration::from_secs(1), propagator.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_handler_discards_forwards() {
        let recorder = Arc::new(Recorder::default());
        let handler: Weak<dyn ForwardHandler> = Arc::<Recorder>::downgrade(&recorder);
        let propagator = GossipPropagator::spawn(handler, 4, 2).unwrap();
        drop(recorder);

        propagator.submit(forward("beta")).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), propagator.wait_idle())
            .await
            .unwrap();
    }

    struct Blocking {
        release: Arc<Semaphore>,
    }

    impl ForwardHandler for Blocking {
        fn deliver(&self, _forward: Forward) {
            while self.release.try_acquire().is_err() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_try_submit_reports_full_queue() {
        let release = Arc::new(Semaphore::new(0));
        let blocking = Arc::new(Blocking {
            release: Arc::clone(&release),
        });
        let handler: Weak<dyn ForwardHandler> = Arc::<Blocking>::downgrade(&blocking);
        let propagator = GossipPropagator::spawn(handler, 1, 1).unwrap();

        let mut saw_full = false;
        for i in 0..16 {
            if let Err(MeshError::QueueFull) = propagator.try_submit(forward(&format!("n{i}"))) {
                saw_full = true;
                break;
            }
        }
        assert!(saw_full);

        release.add_permits(64);
        tokio::time::timeout(Duration::from_secs(5), propagator.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_submit_does_not_block_wait_idle() {
        let release = Arc::new(Semaphore::new(0));
        let blocking = Arc::new(Blocking {
            release: Arc::clone(&release),
        });
        let handler: Weak<dyn ForwardHandler> = Arc::<Blocking>::downgrade(&blocking);
        let propagator = GossipPropagator::spawn(handler, 1, 1).unwrap();

        // With no releases the pipeline saturates after a few forwards, so a
        // submit eventually has to wait for space and gets cancelled.
        let mut cancelled = false;
        for i in 0..16 {
            let submit = propagator.submit(forward(&format!("n{i}")));
            if tokio::time::timeout(Duration::from_millis(5), submit)
                .await
                .is_err()
            {
                cancelled = true;
                break;
            }
        }
        assert!(cancelled);

        release.add_permits(64);
        tokio::time::timeout(Duration::from_secs(5), propagator.wait_idle())
            .await
            .unwrap();
        assert_eq!(propagator.in_flight(), 0);
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let recorder = Arc::new(Recorder::default());
        let handler: Weak<dyn ForwardHandler> = Arc::<Recorder>::downgrade(&recorder);
        assert!(matches!(
            GossipPropagator::spawn(handler, 4, 2),
            Err(MeshError::Runtime(_))
        ));
    }
}
