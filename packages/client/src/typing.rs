//! Cancellable auto-clear timer for the typing indicator.
//!
//! Each arm spawns a sleep that reports back through a channel tagged with an
//! arm generation. Re-arming aborts the previous sleep and bumps the
//! generation, so a fire that was already queued by an older arm is
//! recognised as stale and ignored.

use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle};

/// Identifies one arming of the timer
pub type TimerGeneration = u64;

/// Single-slot typing indicator timer
pub struct TypingTimer {
    period: Duration,
    fired: mpsc::UnboundedSender<TimerGeneration>,
    generation: TimerGeneration,
    pending: Option<JoinHandle<()>>,
}

impl TypingTimer {
    /// Create a disarmed timer that reports fires on `fired`
    pub fn new(period: Duration, fired: mpsc::UnboundedSender<TimerGeneration>) -> Self {
        Self {
            period,
            fired,
            generation: 0,
            pending: None,
        }
    }

    /// (Re)arm the timer, cancelling any pending fire
    pub fn arm(&mut self) {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let period = self.period;
        let fired = self.fired.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            fired.send(generation).ok();
        }));
    }

    /// Cancel a pending fire, if any
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Accept a fire from the channel.
    ///
    /// Returns `true` only for the fire of the current arming; the timer is
    /// disarmed afterwards.
    pub fn accept(&mut self, generation: TimerGeneration) -> bool {
        if generation != self.generation || self.pending.is_none() {
            tracing::trace!("Ignoring stale typing timer fire {}", generation);
            return false;
        }
        self.pending = None;
        true
    }
}

impl Drop for TypingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(3000);

    #[tokio::test(start_paused = true)]
    async fn test_armed_timer_fires_after_period() {
        // テスト項目: 起動したタイマーは指定時間の経過後に発火する
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TypingTimer::new(PERIOD, tx);
        let start = tokio::time::Instant::now();

        // when (操作):
        timer.arm();
        let generation = rx.recv().await.unwrap();

        // then (期待する結果):
        assert_eq!(start.elapsed(), PERIOD);
        assert!(timer.accept(generation));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_cancels_previous_fire() {
        // テスト項目: 再起動すると前回のタイマーは発火せず、最後の起動から計測される
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TypingTimer::new(PERIOD, tx);
        let start = tokio::time::Instant::now();
        timer.arm();
        tokio::time::sleep(Duration::from_millis(2000)).await;

        // when (操作):
        timer.arm();
        let generation = rx.recv().await.unwrap();

        // then (期待する結果):
        assert_eq!(start.elapsed(), Duration::from_millis(5000));
        assert!(timer.accept(generation));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        // テスト項目: キャンセルしたタイマーは発火しない
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TypingTimer::new(PERIOD, tx);
        timer.arm();

        // when (操作):
        timer.cancel();
        tokio::time::sleep(PERIOD * 2).await;

        // then (期待する結果):
        assert!(rx.try_recv().is_err());
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn test_stale_generation_is_rejected() {
        // テスト項目: 古い世代の発火は無視される
        // given (前提条件):
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timer = TypingTimer::new(PERIOD, tx);
        timer.arm();
        let stale = 1;
        timer.arm();

        // when (操作):
        let accepted = timer.accept(stale);

        // then (期待する結果):
        assert!(!accepted);
        assert!(timer.is_armed());
    }
}
