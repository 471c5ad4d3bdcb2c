//! Client-side exam countdown reconciled against the server clock.
//!
//! The displayed value ticks down locally once per second and is overwritten
//! by the authoritative remaining time on every sync. Expiry from either path
//! finalizes the session exactly once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, warn};

use exam_core::model::{FinishReason, SessionId};

use super::engine::SessionEngine;
use crate::error::SessionError;

/// Where the countdown gets authoritative time from and how it finalizes.
#[async_trait]
pub trait ExamClockSource: Send + Sync {
    async fn remaining_seconds(&self, session_id: SessionId) -> Result<u32, SessionError>;

    async fn finish(&self, session_id: SessionId, reason: FinishReason) -> Result<(), SessionError>;
}

#[async_trait]
impl ExamClockSource for SessionEngine {
    async fn remaining_seconds(&self, session_id: SessionId) -> Result<u32, SessionError> {
        self.exam_remaining_seconds(session_id).await
    }

    async fn finish(&self, session_id: SessionId, reason: FinishReason) -> Result<(), SessionError> {
        self.finish_session(session_id, Some(reason)).await?;
        Ok(())
    }
}

/// Sync and tick periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub sync_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(12),
            tick_interval: Duration::from_secs(1),
        }
    }
}

//
// ─── STATE MACHINE ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// No duration; the session is untimed.
    Unstarted,
    Running { remaining: u32 },
    Expired,
    Finalized,
    Cancelled,
}

impl TimerState {
    #[must_use]
    pub fn remaining(self) -> Option<u32> {
        match self {
            TimerState::Running { remaining } => Some(remaining),
            TimerState::Expired | TimerState::Finalized => Some(0),
            TimerState::Unstarted | TimerState::Cancelled => None,
        }
    }
}

/// What the driver should do after feeding an event to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing changed, or the countdown is no longer running.
    Idle,
    Continue,
    /// The countdown just reached zero. Returned at most once.
    Expire,
}

/// Pure countdown transitions, independent of any scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    state: TimerState,
}

impl Countdown {
    #[must_use]
    pub fn new(duration_sec: Option<u32>) -> Self {
        let state = match duration_sec {
            None => TimerState::Unstarted,
            Some(0) => TimerState::Expired,
            Some(remaining) => TimerState::Running { remaining },
        };
        Self { state }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Replace the local value with the server's.
    pub fn apply_sync(&mut self, server_remaining: u32) -> Step {
        match self.state {
            TimerState::Running { .. } => self.set_remaining(server_remaining),
            _ => Step::Idle,
        }
    }

    /// Optimistic one-second decrement between syncs.
    pub fn tick(&mut self) -> Step {
        match self.state {
            TimerState::Running { remaining } => self.set_remaining(remaining.saturating_sub(1)),
            _ => Step::Idle,
        }
    }

    pub fn mark_finalized(&mut self) {
        if self.state == TimerState::Expired {
            self.state = TimerState::Finalized;
        }
    }

    pub fn cancel(&mut self) {
        if !matches!(self.state, TimerState::Finalized | TimerState::Unstarted) {
            self.state = TimerState::Cancelled;
        }
    }

    fn set_remaining(&mut self, remaining: u32) -> Step {
        if remaining == 0 {
            self.state = TimerState::Expired;
            Step::Expire
        } else {
            self.state = TimerState::Running { remaining };
            Step::Continue
        }
    }
}

//
// ─── DRIVER ────────────────────────────────────────────────────────────────────
//

/// How the timer task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerExit {
    /// The session had no duration; nothing was scheduled.
    NotStarted,
    Finalized,
    Cancelled,
}

/// Handle to a running exam countdown.
///
/// Dropping the handle tears the task down, which stops both the sync and
/// tick schedules.
pub struct ExamTimer {
    state: watch::Receiver<TimerState>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<TimerExit, SessionError>>>,
}

impl ExamTimer {
    /// Start the countdown for a session. Must be called inside a tokio runtime.
    ///
    /// `duration_sec` of `None` leaves the timer `Unstarted` and spawns nothing.
    #[must_use]
    pub fn start(
        source: Arc<dyn ExamClockSource>,
        session_id: SessionId,
        duration_sec: Option<u32>,
        config: TimerConfig,
    ) -> Self {
        let countdown = Countdown::new(duration_sec);
        let (state_tx, state_rx) = watch::channel(countdown.state());
        if countdown.state() == TimerState::Unstarted {
            return Self {
                state: state_rx,
                cancel: None,
                task: None,
            };
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(run(
            source, session_id, config, countdown, state_tx, cancel_rx,
        ));
        Self {
            state: state_rx,
            cancel: Some(cancel_tx),
            task: Some(task),
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        *self.state.borrow()
    }

    /// Receiver that observes every published state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TimerState> {
        self.state.clone()
    }

    /// Stop the countdown without finalizing.
    ///
    /// If the timer already finalized, that exit is reported instead.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if finalization failed or the task panicked.
    pub async fn cancel(mut self) -> Result<TimerExit, SessionError> {
        if let Some(cancel) = self.cancel.take() {
            // Err means the task already returned.
            let _ = cancel.send(());
        }
        self.join().await
    }

    /// Wait until the countdown expires and the session is finalized.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if finalization failed or the task panicked.
    pub async fn wait(mut self) -> Result<TimerExit, SessionError> {
        self.join().await
    }

    async fn join(&mut self) -> Result<TimerExit, SessionError> {
        let Some(task) = self.task.take() else {
            return Ok(TimerExit::NotStarted);
        };
        task.await
            .map_err(|e| SessionError::Timer(e.to_string()))?
    }
}

impl Drop for ExamTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    source: Arc<dyn ExamClockSource>,
    session_id: SessionId,
    config: TimerConfig,
    mut countdown: Countdown,
    state_tx: watch::Sender<TimerState>,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<TimerExit, SessionError> {
    let mut sync = interval(config.sync_interval);
    sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick = interval_at(Instant::now() + config.tick_interval, config.tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // A zero duration is already expired before the first sync.
    let mut step = if countdown.state() == TimerState::Expired {
        Step::Expire
    } else {
        Step::Idle
    };

    while step != Step::Expire {
        step = tokio::select! {
            biased;
            _ = &mut cancel_rx => return Ok(cancelled(&mut countdown, &state_tx, session_id)),
            _ = sync.tick() => {
                // A slow sync must not hold up cancellation.
                let synced = tokio::select! {
                    biased;
                    _ = &mut cancel_rx => None,
                    remaining = source.remaining_seconds(session_id) => Some(remaining),
                };
                match synced {
                    None => return Ok(cancelled(&mut countdown, &state_tx, session_id)),
                    Some(Ok(remaining)) => {
                        debug!(session_id = %session_id, remaining, "exam timer synced");
                        countdown.apply_sync(remaining)
                    }
                    Some(Err(err)) => {
                        warn!(session_id = %session_id, error = %err, "exam timer sync failed");
                        Step::Idle
                    }
                }
            }
            _ = tick.tick() => countdown.tick(),
        };
        state_tx.send_replace(countdown.state());
    }

    source.finish(session_id, FinishReason::Time).await?;
    countdown.mark_finalized();
    state_tx.send_replace(countdown.state());
    info!(session_id = %session_id, "exam time is up");
    Ok(TimerExit::Finalized)
}

fn cancelled(
    countdown: &mut Countdown,
    state_tx: &watch::Sender<TimerState>,
    session_id: SessionId,
) -> TimerExit {
    countdown.cancel();
    state_tx.send_replace(countdown.state());
    debug!(session_id = %session_id, "exam timer cancelled");
    TimerExit::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn countdown_ticks_to_expiry_once() {
        let mut countdown = Countdown::new(Some(2));
        assert_eq!(countdown.tick(), Step::Continue);
        assert_eq!(countdown.state(), TimerState::Running { remaining: 1 });
        assert_eq!(countdown.tick(), Step::Expire);
        assert_eq!(countdown.state(), TimerState::Expired);
        assert_eq!(countdown.tick(), Step::Idle);
        assert_eq!(countdown.apply_sync(0), Step::Idle);
    }

    #[test]
    fn sync_overrides_local_value() {
        let mut countdown = Countdown::new(Some(1200));
        countdown.tick();
        countdown.tick();
        assert_eq!(countdown.apply_sync(1150), Step::Continue);
        assert_eq!(countdown.state(), TimerState::Running { remaining: 1150 });
        assert_eq!(countdown.apply_sync(0), Step::Expire);
    }

    #[test]
    fn untimed_countdown_never_runs() {
        let mut countdown = Countdown::new(None);
        assert_eq!(countdown.tick(), Step::Idle);
        assert_eq!(countdown.apply_sync(30), Step::Idle);
        countdown.cancel();
        assert_eq!(countdown.state(), TimerState::Unstarted);
    }

    #[test]
    fn finalize_follows_expiry_only() {
        let mut countdown = Countdown::new(Some(5));
        countdown.mark_finalized();
        assert_eq!(countdown.state(), TimerState::Running { remaining: 5 });
        countdown.apply_sync(0);
        countdown.mark_finalized();
        assert_eq!(countdown.state(), TimerState::Finalized);
        countdown.cancel();
        assert_eq!(countdown.state(), TimerState::Finalized);
    }

    /// Replays scripted server values; the last one repeats.
    struct ScriptedSource {
        remaining: Mutex<Vec<u32>>,
        syncs: AtomicUsize,
        finishes: AtomicUsize,
        sync_delay: Duration,
    }

    impl ScriptedSource {
        fn new(mut script: Vec<u32>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                remaining: Mutex::new(script),
                syncs: AtomicUsize::new(0),
                finishes: AtomicUsize::new(0),
                sync_delay: Duration::ZERO,
            })
        }

        fn slow(script: Vec<u32>, sync_delay: Duration) -> Arc<Self> {
            let mut source = Self::new(script);
            Arc::get_mut(&mut source).unwrap().sync_delay = sync_delay;
            source
        }
    }

    #[async_trait]
    impl ExamClockSource for ScriptedSource {
        async fn remaining_seconds(&self, _session_id: SessionId) -> Result<u32, SessionError> {
            self.syncs.fetch_add(1, Ordering::SeqCst);
            if !self.sync_delay.is_zero() {
                tokio::time::sleep(self.sync_delay).await;
            }
            let mut script = self.remaining.lock().unwrap();
            let value = if script.len() > 1 {
                script.pop().unwrap()
            } else {
                script[0]
            };
            Ok(value)
        }

        async fn finish(
            &self,
            _session_id: SessionId,
            reason: FinishReason,
        ) -> Result<(), SessionError> {
            assert_eq!(reason, FinishReason::Time);
            self.finishes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn local_ticks_expire_and_finalize_once() {
        let source = ScriptedSource::new(vec![3]);
        let timer = ExamTimer::start(
            source.clone(),
            SessionId::new(1),
            Some(1200),
            TimerConfig::default(),
        );
        let mut states = timer.subscribe();

        let exit = timer.wait().await.unwrap();
        assert_eq!(exit, TimerExit::Finalized);
        assert_eq!(source.finishes.load(Ordering::SeqCst), 1);
        assert_eq!(source.syncs.load(Ordering::SeqCst), 1);
        assert_eq!(*states.borrow_and_update(), TimerState::Finalized);
    }

    #[tokio::test(start_paused = true)]
    async fn server_zero_on_first_sync_finalizes_immediately() {
        let source = ScriptedSource::new(vec![0]);
        let start = Instant::now();
        let timer = ExamTimer::start(
            source.clone(),
            SessionId::new(1),
            Some(1200),
            TimerConfig::default(),
        );

        assert_eq!(timer.wait().await.unwrap(), TimerExit::Finalized);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(source.finishes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_corrects_drifted_countdown() {
        // Local ticks alone would need 30s; the second sync says 5s are left.
        let source = ScriptedSource::new(vec![30, 5]);
        let start = Instant::now();
        let timer = ExamTimer::start(
            source.clone(),
            SessionId::new(1),
            Some(1200),
            TimerConfig::default(),
        );

        assert_eq!(timer.wait().await.unwrap(), TimerExit::Finalized);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(16), "{elapsed:?}");
        assert!(elapsed <= Duration::from_secs(17), "{elapsed:?}");
        assert_eq!(source.syncs.load(Ordering::SeqCst), 2);
        assert_eq!(source.finishes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_tears_down_without_finalizing() {
        let source = ScriptedSource::new(vec![600]);
        let timer = ExamTimer::start(
            source.clone(),
            SessionId::new(1),
            Some(1200),
            TimerConfig::default(),
        );
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(matches!(timer.state(), TimerState::Running { .. }));

        assert_eq!(timer.cancel().await.unwrap(), TimerExit::Cancelled);
        assert_eq!(source.finishes.load(Ordering::SeqCst), 0);
        let syncs = source.syncs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.syncs.load(Ordering::SeqCst), syncs);
    }

    #[tokio::test]
    async fn untimed_session_spawns_nothing() {
        let source = ScriptedSource::new(vec![10]);
        let timer = ExamTimer::start(source.clone(), SessionId::new(1), None, TimerConfig::default());
        assert_eq!(timer.state(), TimerState::Unstarted);
        assert_eq!(timer.wait().await.unwrap(), TimerExit::NotStarted);
        assert_eq!(source.syncs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_syncing() {
        let source = ScriptedSource::new(vec![600]);
        let timer = ExamTimer::start(
            source.clone(),
            SessionId::new(1),
            Some(1200),
            TimerConfig::default(),
        );
        tokio::time::sleep(Duration::from_secs(30)).await;
        let syncs = source.syncs.load(Ordering::SeqCst);
        assert!(syncs >= 2);

        drop(timer);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.syncs.load(Ordering::SeqCst), syncs);
        assert_eq!(source.finishes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_does_not_wait_for_a_slow_sync() {
        let source = ScriptedSource::slow(vec![600], Duration::from_secs(300));
        let timer = ExamTimer::start(
            source.clone(),
            SessionId::new(1),
            Some(1200),
            TimerConfig::default(),
        );
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.syncs.load(Ordering::SeqCst), 1);

        let start = Instant::now();
        assert_eq!(timer.cancel().await.unwrap(), TimerExit::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(source.finishes.load(Ordering::SeqCst), 0);
    }
}
