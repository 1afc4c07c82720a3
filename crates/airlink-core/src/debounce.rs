// ── Request debouncer ──
//
// Collapses bursts of on-demand refresh requests into a single
// underlying operation. Leading-edge semantics: the first request in a
// quiet period fires immediately; requests arriving during the cooldown
// coalesce into at most one follow-up at the end of the window.
// Implemented as an explicit state machine rather than a borrowed timer
// utility so coalescing and cancellation are directly testable.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Debounce state. `Cooling { pending }` means a request fired within
/// the last cooldown window; `pending` records whether a follow-up is
/// owed at the end of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Cooling { pending: bool },
}

struct Shared {
    cooldown: Duration,
    action: Box<dyn Fn() + Send + Sync>,
    state: Mutex<State>,
    cancel: CancellationToken,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leading-edge debouncer with single-slot coalescing.
pub(crate) struct Debouncer {
    shared: Arc<Shared>,
}

impl Debouncer {
    /// `action` must be cheap and non-blocking; it runs synchronously
    /// inside `request` and inside the cooldown timer task. The token
    /// tears down any pending timer when cancelled.
    pub(crate) fn new(
        cooldown: Duration,
        cancel: CancellationToken,
        action: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cooldown,
                action: Box::new(action),
                state: Mutex::new(State::Idle),
                cancel,
            }),
        }
    }

    /// Request one execution. Must be called from within a tokio
    /// runtime (the cooldown timer is a spawned task).
    pub(crate) fn request(&self) {
        let fire = {
            let mut state = self.shared.lock_state();
            match *state {
                State::Idle => {
                    *state = State::Cooling { pending: false };
                    true
                }
                // Duplicate within the window: coalesce, never queue.
                State::Cooling { .. } => {
                    *state = State::Cooling { pending: true };
                    false
                }
            }
        };

        if fire {
            (self.shared.action)();
            spawn_cooldown_timer(Arc::clone(&self.shared));
        }
    }

    /// Discard any pending follow-up and stop the timer task.
    pub(crate) fn cancel(&self) {
        self.shared.cancel.cancel();
    }
}

/// One timer task per burst. Re-arms itself as long as follow-ups keep
/// being owed, so a sustained stream of requests executes once per
/// cooldown window.
fn spawn_cooldown_timer(shared: Arc<Shared>) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = shared.cancel.cancelled() => {
                    *shared.lock_state() = State::Idle;
                    break;
                }
                () = tokio::time::sleep(shared.cooldown) => {}
            }

            let fire = {
                let mut state = shared.lock_state();
                match *state {
                    State::Cooling { pending: true } => {
                        *state = State::Cooling { pending: false };
                        true
                    }
                    _ => {
                        *state = State::Idle;
                        false
                    }
                }
            };

            if fire {
                (shared.action)();
            } else {
                break;
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_debouncer(cooldown: Duration) -> (Debouncer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&count);
        let debouncer = Debouncer::new(cooldown, CancellationToken::new(), move || {
            probe.fetch_add(1, Ordering::SeqCst);
        });
        (debouncer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_fires_immediately() {
        let (debouncer, count) = counting_debouncer(Duration::from_secs(1));

        debouncer.request();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_coalesces_into_one_follow_up() {
        let (debouncer, count) = counting_debouncer(Duration::from_secs(1));

        // Five requests inside one cooldown window: one immediate
        // execution, duplicates merged.
        for _ in 0..5 {
            debouncer.request();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // End of the window: exactly one coalesced follow-up.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // Quiet period over, nothing else owed.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn request_after_window_fires_fresh() {
        let (debouncer, count) = counting_debouncer(Duration::from_secs(1));

        debouncer.request();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Let the cooldown fully lapse with no pending follow-up.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        debouncer.request();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_stream_fires_once_per_window() {
        let (debouncer, count) = counting_debouncer(Duration::from_secs(1));

        // A request every 100ms for 3 seconds.
        for _ in 0..30 {
            debouncer.request();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Leading fire plus one per elapsed window: far fewer than 30.
        let fired = count.load(Ordering::SeqCst);
        assert!((2..=5).contains(&fired), "fired {fired} times");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_follow_up() {
        let (debouncer, count) = counting_debouncer(Duration::from_secs(1));

        debouncer.request();
        debouncer.request(); // owes a follow-up
        assert_eq!(count.load(Ordering::SeqCst), 1);

        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        // The owed follow-up never ran.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
