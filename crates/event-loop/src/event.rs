use std::fmt::{self, Debug};

use tokio::sync::oneshot;

use crate::EventLoop;

/// Object-safe form of [`Event`], so events of different types can share
/// one queue.
pub trait BoxEvent<S>: Send + Debug + 'static {
    fn handle_box(self: Box<Self>, state: &mut S, handle: &EventLoop<S>);
}

/// An event the loop can handle.
pub trait Event<S>: BoxEvent<S> {
    /// Handles the event with exclusive access to the loop's state.
    ///
    /// Handlers run to completion without yielding. Anything that needs to
    /// wait must be spawned and report back with another event.
    fn handle(self, state: &mut S, handle: &EventLoop<S>);
}

impl<S, E: Event<S>> BoxEvent<S> for E {
    #[inline]
    fn handle_box(self: Box<Self>, state: &mut S, handle: &EventLoop<S>) {
        (*self).handle(state, handle)
    }
}

/// A closure run against the state, answered over a oneshot channel.
pub(crate) struct Query<F, R> {
    pub(crate) f: F,
    pub(crate) reply: oneshot::Sender<R>,
}

impl<F, R> Debug for Query<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").finish_non_exhaustive()
    }
}

impl<S, F, R> Event<S> for Query<F, R>
where
    S: 'static,
    F: FnOnce(&mut S, &EventLoop<S>) -> R + Send + 'static,
    R: Send + 'static,
{
    #[inline]
    fn handle(self, state: &mut S, handle: &EventLoop<S>) {
        // The caller may have given up waiting.
        self.reply.send((self.f)(state, handle)).ok();
    }
}
