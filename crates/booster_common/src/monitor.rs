//! Periodic metrics sampling during an active session.
//!
//! The reporter runs as an independent tokio task. It only ever reads
//! through the probe, so it can overlap freely with the session's
//! configuration state. Transient probe failures are logged and
//! skipped; after enough consecutive failures the task emits a
//! `Degraded` event and stops sampling without touching the session.

use crate::metrics::Metrics;
use crate::probe::DiagnosticsProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default gap between samples.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default consecutive-failure threshold before degrading.
pub const DEGRADED_AFTER: u32 = 3;

/// What the monitor pushes into its sink.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Sample(Metrics),
    /// Sampling stopped after this many consecutive probe failures.
    /// Session optimization state is unaffected.
    Degraded { consecutive_failures: u32 },
}

/// Handle to the running monitor task.
pub struct MonitorReporter {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl MonitorReporter {
    /// Begin periodic sampling, pushing events into `sink` until
    /// [`Self::stop`], sink closure, or degradation.
    pub fn start(
        probe: Arc<dyn DiagnosticsProbe>,
        interval: Duration,
        max_consecutive_failures: u32,
        sink: mpsc::Sender<MonitorEvent>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let threshold = max_consecutive_failures.max(1);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut consecutive_failures = 0u32;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // The probe shells out to ping; keep that off
                        // the async workers.
                        let probe = probe.clone();
                        let sampled =
                            tokio::task::spawn_blocking(move || probe.sample()).await;

                        match sampled {
                            Ok(Ok(metrics)) => {
                                consecutive_failures = 0;
                                debug!(latency_ms = metrics.latency_ms, "sample");
                                if sink.send(MonitorEvent::Sample(metrics)).await.is_err() {
                                    break;
                                }
                            }
                            Ok(Err(e)) => {
                                consecutive_failures += 1;
                                warn!(
                                    consecutive = consecutive_failures,
                                    error = %e,
                                    "probe sample failed"
                                );
                                if consecutive_failures >= threshold {
                                    let _ = sink
                                        .send(MonitorEvent::Degraded { consecutive_failures })
                                        .await;
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "probe task panicked, monitor stopping");
                                break;
                            }
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        MonitorReporter { stop_tx, handle }
    }

    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoostError;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::timeout;

    fn metrics() -> Metrics {
        Metrics {
            signal_strength_pct: 80.0,
            download_mbps: 100.0,
            upload_mbps: 20.0,
            latency_ms: 12.0,
            sampled_at: Utc::now(),
        }
    }

    /// Probe that replays a script, then keeps returning the final entry.
    struct ScriptedProbe {
        script: Mutex<VecDeque<Result<(), ()>>>,
    }

    impl ScriptedProbe {
        fn new(script: &[Result<(), ()>]) -> Self {
            ScriptedProbe {
                script: Mutex::new(script.iter().copied().collect()),
            }
        }
    }

    impl DiagnosticsProbe for ScriptedProbe {
        fn sample(&self) -> Result<Metrics, BoostError> {
            let mut script = self.script.lock().unwrap();
            let step = script.pop_front().unwrap_or(Ok(()));
            match step {
                Ok(()) => Ok(metrics()),
                Err(()) => Err(BoostError::ProbeUnavailable("scripted failure".to_string())),
            }
        }
    }

    const TICK: Duration = Duration::from_millis(5);
    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test(flavor = "multi_thread")]
    async fn test_samples_flow_into_sink() {
        let probe = Arc::new(ScriptedProbe::new(&[Ok(()), Ok(()), Ok(())]));
        let (tx, mut rx) = mpsc::channel(16);
        let reporter = MonitorReporter::start(probe, TICK, DEGRADED_AFTER, tx);

        for _ in 0..3 {
            let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert!(matches!(event, MonitorEvent::Sample(_)));
        }
        reporter.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transient_failures_are_tolerated() {
        // Two failures, then recovery: the failure count resets and
        // sampling continues without a Degraded event.
        let probe = Arc::new(ScriptedProbe::new(&[Err(()), Err(()), Ok(()), Err(()), Ok(())]));
        let (tx, mut rx) = mpsc::channel(16);
        let reporter = MonitorReporter::start(probe, TICK, DEGRADED_AFTER, tx);

        for _ in 0..2 {
            let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert!(
                matches!(event, MonitorEvent::Sample(_)),
                "no Degraded expected below the threshold"
            );
        }
        reporter.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_three_consecutive_failures_degrade_and_stop() {
        let probe = Arc::new(ScriptedProbe::new(&[Err(()), Err(()), Err(())]));
        let (tx, mut rx) = mpsc::channel(16);
        let _reporter = MonitorReporter::start(probe, TICK, DEGRADED_AFTER, tx);

        let event = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        match event {
            MonitorEvent::Degraded {
                consecutive_failures,
            } => assert_eq!(consecutive_failures, 3),
            other => panic!("expected Degraded, got {:?}", other),
        }
        // The task stopped sampling: the channel closes.
        assert!(timeout(WAIT, rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_ends_the_task_promptly() {
        let probe = Arc::new(ScriptedProbe::new(&[]));
        let (tx, mut rx) = mpsc::channel(16);
        let reporter = MonitorReporter::start(probe, TICK, DEGRADED_AFTER, tx);

        let _ = timeout(WAIT, rx.recv()).await.unwrap();
        timeout(WAIT, reporter.stop()).await.unwrap();
        // Sender dropped with the task.
        while timeout(WAIT, rx.recv()).await.unwrap().is_some() {}
    }
}
