//! Incremental reveal of reply text.
//!
//! The backend hands over a reply in one piece. A [`Reveal`] turns it into
//! a [`TextStream`] that yields the text in small increments, so the UI can
//! render it as if it was being generated. A real incremental transport
//! can implement the same traits without changing the controller.

use std::fmt::{self, Debug};
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::time::{Instant, Sleep, sleep};

/// A finite, ordered sequence of text increments.
pub trait TextStream: Send {
    /// Polls for the next increment.
    ///
    /// Returns `Poll::Ready(None)` once the whole text has been produced.
    /// The stream must not be polled again after that.
    fn poll_next_increment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<String>>;
}

/// Creates a [`TextStream`] for a complete text.
pub trait Reveal: Send + Sync + 'static {
    /// Starts revealing `text`.
    fn reveal(&self, text: String) -> Pin<Box<dyn TextStream>>;
}

/// Waits for the next increment of `stream`.
pub async fn next_increment(
    stream: &mut Pin<Box<dyn TextStream>>,
) -> Option<String> {
    poll_fn(|cx| stream.as_mut().poll_next_increment(cx)).await
}

/// Reveals one character per tick.
#[derive(Clone, Copy, Debug)]
pub struct SimulatedReveal {
    tick: Duration,
}

impl SimulatedReveal {
    /// Creates a reveal that emits a character every `tick`.
    #[inline]
    pub fn new(tick: Duration) -> Self {
        Self { tick }
    }
}

impl Default for SimulatedReveal {
    #[inline]
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

impl Reveal for SimulatedReveal {
    fn reveal(&self, text: String) -> Pin<Box<dyn TextStream>> {
        Box::pin(SimulatedStream::new(text, self.tick))
    }
}

pin_project! {
    /// The stream created by [`SimulatedReveal`].
    ///
    /// Each increment is a single Unicode scalar value, yielded one tick
    /// after the previous one. An empty text finishes without waiting.
    pub struct SimulatedStream {
        text: String,
        offset: usize,
        tick: Duration,
        #[pin]
        sleep: Sleep,
    }
}

impl SimulatedStream {
    /// Creates the stream. Must be called within a tokio runtime.
    pub fn new(text: String, tick: Duration) -> Self {
        Self {
            text,
            offset: 0,
            tick,
            sleep: sleep(tick),
        }
    }
}

impl Debug for SimulatedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedStream")
            .field("len", &self.text.len())
            .field("offset", &self.offset)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl TextStream for SimulatedStream {
    fn poll_next_increment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<String>> {
        let mut this = self.project();
        let Some(next) = this.text[*this.offset..].chars().next() else {
            return Poll::Ready(None);
        };

        ready!(this.sleep.as_mut().poll(cx));
        *this.offset += next.len_utf8();
        let tick = *this.tick;
        this.sleep.as_mut().reset(Instant::now() + tick);
        Poll::Ready(Some(next.to_string()))
    }
}
