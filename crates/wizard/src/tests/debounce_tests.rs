use super::*;
use std::sync::atomic::AtomicUsize;

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn fires_once_after_quiet_period() {
    let fired = Arc::new(AtomicUsize::new(0));
    let mut debouncer = Debouncer::new(Duration::from_millis(1500));

    let counter = fired.clone();
    debouncer.schedule(&Handle::current(), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    settle().await;
    assert!(debouncer.is_pending());

    tokio::time::advance(Duration::from_millis(1499)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::advance(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!debouncer.is_pending());
}

#[tokio::test(start_paused = true)]
async fn rescheduling_restarts_the_window() {
    let fired = Arc::new(AtomicUsize::new(0));
    let mut debouncer = Debouncer::new(Duration::from_millis(300));

    for _ in 0..3 {
        let counter = fired.clone();
        debouncer.schedule(&Handle::current(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;
        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::advance(Duration::from_millis(150)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_cancels_pending_work() {
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let counter = fired.clone();
        debouncer.schedule(&Handle::current(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        settle().await;
    }

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn liveness_is_shared_between_clones() {
    let liveness = Liveness::new();
    let queued = liveness.clone();
    assert!(queued.is_alive());
    liveness.kill();
    assert!(!queued.is_alive());
    assert_eq!(queued.instance(), liveness.instance());
    assert_ne!(Liveness::new().instance(), liveness.instance());
}
