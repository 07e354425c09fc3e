use std::time::Duration;

/// Timing knobs of the controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub(crate) stream_tick: Duration,
    pub(crate) anonymous_delay: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) hold_duration: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stream_tick: Duration::from_millis(20),
            anonymous_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(60),
            hold_duration: Duration::from_millis(500),
        }
    }
}

impl ControllerConfig {
    /// Sets the interval between two revealed characters.
    ///
    /// Only used by the default reveal; a custom one set through
    /// [`ControllerBuilder::with_reveal`](crate::ControllerBuilder::with_reveal)
    /// ignores it.
    #[inline]
    pub fn with_stream_tick(mut self, tick: Duration) -> Self {
        self.stream_tick = tick;
        self
    }

    /// Sets how long an anonymous message waits before its canned reply.
    #[inline]
    pub fn with_anonymous_delay(mut self, delay: Duration) -> Self {
        self.anonymous_delay = delay;
        self
    }

    /// Sets the deadline covering all network calls of one message.
    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets how long a conversation must be pressed to arm its deletion.
    #[inline]
    pub fn with_hold_duration(mut self, duration: Duration) -> Self {
        self.hold_duration = duration;
        self
    }

    /// Returns the interval between two revealed characters.
    #[inline]
    pub fn stream_tick(&self) -> Duration {
        self.stream_tick
    }

    /// Returns the anonymous reply delay.
    #[inline]
    pub fn anonymous_delay(&self) -> Duration {
        self.anonymous_delay
    }

    /// Returns the per-message network deadline.
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the press duration that arms a deletion.
    #[inline]
    pub fn hold_duration(&self) -> Duration {
        self.hold_duration
    }
}
