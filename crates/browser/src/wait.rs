//! Bounded condition polling
//!
//! The event stream updates tab state asynchronously; callers block on that
//! state through one generic poll primitive. On deadline expiry it returns a
//! sentinel instead of erroring, because the two call sites disagree on what
//! expiry means: the load-event wait soft-stops, node selection never
//! expires.

use std::time::Duration;

/// Poll `predicate` every `interval` until it holds or `deadline` elapses.
///
/// Returns `true` when the predicate was satisfied, `false` on expiry.
/// `deadline: None` polls forever (bounded only by caller cancellation).
pub async fn poll_until<F>(interval: Duration, deadline: Option<Duration>, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = tokio::time::Instant::now();
    loop {
        if predicate() {
            return true;
        }
        if let Some(max) = deadline {
            if started.elapsed() >= max {
                return false;
            }
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_immediately_when_predicate_already_holds() {
        let hit = poll_until(Duration::from_millis(10), Some(Duration::from_secs(5)), || true).await;
        assert!(hit);
    }

    #[tokio::test]
    async fn returns_false_on_deadline() {
        let started = tokio::time::Instant::now();
        let hit = poll_until(
            Duration::from_millis(10),
            Some(Duration::from_millis(50)),
            || false,
        )
        .await;
        assert!(!hit);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn observes_condition_set_by_another_task() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            setter.store(true, Ordering::SeqCst);
        });

        let hit = poll_until(
            Duration::from_millis(5),
            Some(Duration::from_secs(2)),
            move || flag.load(Ordering::SeqCst),
        )
        .await;
        assert!(hit);
    }
}
