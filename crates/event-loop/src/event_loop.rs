use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::event::{BoxEvent, Query};
use crate::{Event, LoopClosedError};

enum Envelope<S> {
    Event(Box<dyn BoxEvent<S>>),
    /// Wakes the loop up after [`EventLoop::shutdown`].
    Stop,
}

struct Shared<S> {
    queue: mpsc::UnboundedSender<Envelope<S>>,
    stopped: AtomicBool,
}

/// Handle to a running event loop.
///
/// Handles are cheap to clone. The loop stops once every handle has been
/// dropped, or after [`EventLoop::shutdown`] is called.
pub struct EventLoop<S> {
    shared: Arc<Shared<S>>,
}

impl<S: Send + 'static> EventLoop<S> {
    /// Spawns a loop owning `state` onto the current tokio runtime.
    ///
    /// `label` is attached to the tracing span of the loop task.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let (queue, inbox) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            queue,
            stopped: AtomicBool::new(false),
        });
        tokio::spawn(
            run(Arc::downgrade(&shared), state, inbox)
                .instrument(debug_span!("event loop", label = label)),
        );
        Self { shared }
    }

    /// Posts an event. Events are handled in the order they are posted.
    pub fn send<E: Event<S> + 'static>(
        &self,
        event: E,
    ) -> Result<(), LoopClosedError> {
        if self.is_stopped() {
            return Err(LoopClosedError);
        }
        self.shared
            .queue
            .send(Envelope::Event(Box::new(event)))
            .map_err(|_| LoopClosedError)
    }

    /// Runs `f` against the state after every event posted before it, and
    /// returns its result.
    pub async fn query<F, R>(&self, f: F) -> Result<R, LoopClosedError>
    where
        F: FnOnce(&mut S, &EventLoop<S>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, answer) = oneshot::channel();
        self.send(Query { f, reply })?;
        answer.await.map_err(|_| LoopClosedError)
    }

    /// Asks the loop to stop.
    ///
    /// Events already queued are dropped without being handled, and
    /// later ones are refused.
    pub fn shutdown(&self) {
        if !self.shared.stopped.swap(true, Ordering::AcqRel) {
            self.shared.queue.send(Envelope::Stop).ok();
        }
    }

    #[inline]
    fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }
}

impl<S> Clone for EventLoop<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

async fn run<S: Send + 'static>(
    shared: Weak<Shared<S>>,
    mut state: S,
    mut inbox: mpsc::UnboundedReceiver<Envelope<S>>,
) {
    debug!("started");
    let mut handled = 0u64;
    while let Some(envelope) = inbox.recv().await {
        let Envelope::Event(event) = envelope else {
            break;
        };
        // Only handles keep the loop alive; without one nobody can observe
        // the result.
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let handle = EventLoop { shared };
        if handle.is_stopped() {
            break;
        }

        trace_span!("handle event", seq = handled).in_scope(|| {
            trace!("{event:?}");
            event.handle_box(&mut state, &handle);
        });
        handled += 1;
    }
    debug!("stopped after {handled} events");
}
