// src/reset.rs
//! Deferred disconnect of freshly connected channels
//!
//! Some Xexun firmwares keep a socket open indefinitely after reporting. When
//! a reset delay is configured, every connection is forcibly closed that long
//! after it was established.

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, warn};

/// Channel handle that can be severed from another task
pub trait Disconnect: Send + Sync + 'static {
    fn disconnect(&self);
}

/// Lifecycle events raised by the transport for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Channel connected; carries the peer address when the transport knows it
    Connected(Option<SocketAddr>),
    Disconnected,
    Other,
}

/// What happens to an armed reset when the channel delivers a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// Keep the timer; the channel is closed after the delay no matter what
    #[default]
    Never,
    /// Abort the timer on the first successfully decoded sentence
    OnDecode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetPolicy {
    pub delay: Duration,
    pub cancel: CancelPolicy,
}

impl ResetPolicy {
    pub fn new(delay_ms: u64, cancel: CancelPolicy) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            cancel,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, CancelPolicy::Never)
    }

    /// A zero delay turns the policy off
    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero()
    }
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Idle,
    Armed,
    Terminal,
}

/// Per-channel reset state machine.
///
/// Owned by the task handling the channel. At most one timer is ever armed for
/// a given instance.
pub struct ConnectionReset<C: Disconnect> {
    policy: ResetPolicy,
    channel: Arc<C>,
    timer: Option<JoinHandle<()>>,
}

impl<C: Disconnect> ConnectionReset<C> {
    pub fn new(policy: ResetPolicy, channel: Arc<C>) -> Self {
        Self {
            policy,
            channel,
            timer: None,
        }
    }

    pub fn state(&self) -> ResetState {
        match &self.timer {
            None => ResetState::Idle,
            Some(timer) if timer.is_finished() => ResetState::Terminal,
            Some(_) => ResetState::Armed,
        }
    }

    /// Feed one lifecycle event of the channel
    pub fn on_channel_event(&mut self, event: &ChannelEvent) {
        if let ChannelEvent::Connected(Some(peer)) = event {
            if self.policy.is_enabled() {
                self.arm(*peer);
            }
        }
    }

    /// Report a successfully decoded sentence on the channel
    pub fn on_decoded(&mut self) {
        if self.policy.cancel != CancelPolicy::OnDecode || self.state() != ResetState::Armed {
            return;
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("Reset timer cancelled after decoded sentence");
        }
    }

    fn arm(&mut self, peer: SocketAddr) {
        if self.timer.is_some() {
            debug!(%peer, state = ?self.state(), "Reset already scheduled, ignoring connect");
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(%peer, "Failed to schedule reset: {}", e);
                return;
            }
        };

        let delay = self.policy.delay;
        let channel = Arc::clone(&self.channel);
        self.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(%peer, "Reset delay elapsed, disconnecting");
            channel.disconnect();
        }));
        debug!(%peer, delay_ms = delay.as_millis() as u64, "Reset scheduled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingChannel {
        disconnects: AtomicUsize,
    }

    impl CountingChannel {
        fn count(&self) -> usize {
            self.disconnects.load(Ordering::SeqCst)
        }
    }

    impl Disconnect for CountingChannel {
        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.0.0.5:40000".parse().unwrap())
    }

    fn setup(delay_ms: u64, cancel: CancelPolicy) -> (Arc<CountingChannel>, ConnectionReset<CountingChannel>) {
        let channel = Arc::new(CountingChannel::default());
        let reset = ConnectionReset::new(ResetPolicy::new(delay_ms, cancel), Arc::clone(&channel));
        (channel, reset)
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_never_arms() {
        let (channel, mut reset) = setup(0, CancelPolicy::Never);

        reset.on_channel_event(&ChannelEvent::Connected(peer()));
        assert_eq!(reset.state(), ResetState::Idle);

        sleep_ms(60_000).await;
        assert_eq!(channel.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_events_are_ignored() {
        let (channel, mut reset) = setup(1000, CancelPolicy::Never);

        reset.on_channel_event(&ChannelEvent::Connected(None));
        reset.on_channel_event(&ChannelEvent::Other);
        reset.on_channel_event(&ChannelEvent::Disconnected);
        assert_eq!(reset.state(), ResetState::Idle);

        sleep_ms(5000).await;
        assert_eq!(channel.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnects_after_delay_not_before() {
        let (channel, mut reset) = setup(5000, CancelPolicy::Never);

        reset.on_channel_event(&ChannelEvent::Connected(peer()));
        assert_eq!(reset.state(), ResetState::Armed);

        sleep_ms(4999).await;
        assert_eq!(channel.count(), 0);
        assert_eq!(reset.state(), ResetState::Armed);

        sleep_ms(2).await;
        assert_eq!(channel.count(), 1);
        assert_eq!(reset.state(), ResetState::Terminal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_connect_arms_once() {
        let (channel, mut reset) = setup(1000, CancelPolicy::Never);

        reset.on_channel_event(&ChannelEvent::Connected(peer()));
        reset.on_channel_event(&ChannelEvent::Connected(peer()));

        sleep_ms(1500).await;
        assert_eq!(channel.count(), 1);

        reset.on_channel_event(&ChannelEvent::Connected(peer()));
        sleep_ms(1500).await;
        assert_eq!(channel.count(), 1);
        assert_eq!(reset.state(), ResetState::Terminal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_cancels_when_configured() {
        let (channel, mut reset) = setup(1000, CancelPolicy::OnDecode);

        reset.on_channel_event(&ChannelEvent::Connected(peer()));
        reset.on_decoded();
        assert_eq!(reset.state(), ResetState::Idle);

        sleep_ms(2000).await;
        assert_eq!(channel.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_keeps_timer_by_default() {
        let (channel, mut reset) = setup(1000, CancelPolicy::Never);

        reset.on_channel_event(&ChannelEvent::Connected(peer()));
        reset.on_decoded();
        assert_eq!(reset.state(), ResetState::Armed);

        sleep_ms(2000).await;
        assert_eq!(channel.count(), 1);
    }

    #[test]
    fn test_no_runtime_leaves_idle() {
        let (channel, mut reset) = setup(1000, CancelPolicy::Never);

        reset.on_channel_event(&ChannelEvent::Connected(peer()));
        assert_eq!(reset.state(), ResetState::Idle);
        assert_eq!(channel.count(), 0);
    }
}
