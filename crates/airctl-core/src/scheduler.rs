// ── Refresh scheduler ──
//
// Polls the selected device on a fixed period while the panel is
// visible. Becoming visible (or regaining focus) triggers an immediate
// full refresh and restarts the period; going hidden stops it. The timer
// is also restarted whenever the selected device changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What the scheduler asks the controller to reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    /// Device list plus the selected device.
    Full,
    /// Only the selected device.
    Device,
}

/// Inputs the scheduler reacts to.
pub struct RefreshSignals {
    pub visible: watch::Receiver<bool>,
    pub selected_device: watch::Receiver<Option<i64>>,
    pub focus: Arc<Notify>,
}

fn start_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Run until `cancel` fires or the receiving side goes away.
pub async fn run<T>(
    period: Duration,
    mut signals: RefreshSignals,
    tx: mpsc::Sender<T>,
    cancel: CancellationToken,
) where
    T: From<RefreshRequest> + Send,
{
    let mut visible = *signals.visible.borrow_and_update();
    let mut selected = *signals.selected_device.borrow_and_update();
    let mut interval = None;

    // Mirrors a selection change: refresh now and restart the period.
    if visible {
        if tx.send(RefreshRequest::Full.into()).await.is_err() {
            return;
        }
        interval = Some(start_interval(period));
    }

    loop {
        let request = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = signals.visible.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *signals.visible.borrow_and_update();
                if now == visible {
                    continue;
                }
                visible = now;
                debug!(visible, "visibility changed");
                if !visible {
                    interval = None;
                    continue;
                }
                interval = Some(start_interval(period));
                RefreshRequest::Full
            }
            () = signals.focus.notified() => {
                if !visible {
                    continue;
                }
                interval = Some(start_interval(period));
                RefreshRequest::Full
            }
            changed = signals.selected_device.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *signals.selected_device.borrow_and_update();
                if now == selected {
                    continue;
                }
                selected = now;
                if !visible {
                    interval = None;
                    continue;
                }
                interval = Some(start_interval(period));
                RefreshRequest::Full
            }
            () = next_tick(&mut interval) => {
                if !visible || selected.is_none() {
                    continue;
                }
                RefreshRequest::Device
            }
        };

        if tx.send(request.into()).await.is_err() {
            break;
        }
    }
    debug!("refresh scheduler stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(30);

    struct Harness {
        visible: watch::Sender<bool>,
        selected: watch::Sender<Option<i64>>,
        focus: Arc<Notify>,
        rx: mpsc::Receiver<RefreshRequest>,
        cancel: CancellationToken,
    }

    fn spawn(visible: bool, selected: Option<i64>) -> Harness {
        let (visible_tx, visible_rx) = watch::channel(visible);
        let (selected_tx, selected_rx) = watch::channel(selected);
        let focus = Arc::new(Notify::new());
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        tokio::spawn(run(
            PERIOD,
            RefreshSignals {
                visible: visible_rx,
                selected_device: selected_rx,
                focus: Arc::clone(&focus),
            },
            tx,
            cancel.clone(),
        ));

        Harness {
            visible: visible_tx,
            selected: selected_tx,
            focus,
            rx,
            cancel,
        }
    }

    /// Let the scheduler task observe whatever just changed.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    fn drain(rx: &mut mpsc::Receiver<RefreshRequest>) -> Vec<RefreshRequest> {
        let mut out = Vec::new();
        while let Ok(request) = rx.try_recv() {
            out.push(request);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn visible_start_refreshes_then_polls_every_period() {
        let mut h = spawn(true, Some(7));
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Full]);

        tokio::time::advance(PERIOD - Duration::from_secs(1)).await;
        settle().await;
        assert!(drain(&mut h.rx).is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Device]);

        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Device]);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_stops_polling_and_visible_resumes_with_full_refresh() {
        let mut h = spawn(true, Some(7));
        settle().await;
        drain(&mut h.rx);

        h.visible.send(false).unwrap();
        settle().await;
        tokio::time::advance(PERIOD * 3).await;
        settle().await;
        assert!(drain(&mut h.rx).is_empty());

        h.visible.send(true).unwrap();
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Full]);

        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Device]);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_start_waits_for_visibility() {
        let mut h = spawn(false, Some(7));
        tokio::time::advance(PERIOD * 2).await;
        settle().await;
        assert!(drain(&mut h.rx).is_empty());

        h.focus.notify_one();
        settle().await;
        assert!(drain(&mut h.rx).is_empty());
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn focus_while_visible_restarts_the_period() {
        let mut h = spawn(true, Some(7));
        settle().await;
        drain(&mut h.rx);

        tokio::time::advance(Duration::from_secs(20)).await;
        h.focus.notify_one();
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Full]);

        // The old deadline (t=30s) no longer fires.
        tokio::time::advance(Duration::from_secs(15)).await;
        settle().await;
        assert!(drain(&mut h.rx).is_empty());

        tokio::time::advance(Duration::from_secs(15)).await;
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Device]);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn device_change_restarts_timer_and_no_device_means_no_polls() {
        let mut h = spawn(true, None);
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Full]);

        tokio::time::advance(PERIOD).await;
        settle().await;
        assert!(drain(&mut h.rx).is_empty());

        h.selected.send(Some(3)).unwrap();
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Full]);

        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(drain(&mut h.rx), vec![RefreshRequest::Device]);
        h.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_the_task() {
        let mut h = spawn(true, Some(1));
        settle().await;
        drain(&mut h.rx);
        h.cancel.cancel();
        settle().await;
        assert!(h.rx.recv().await.is_none());
    }
}
