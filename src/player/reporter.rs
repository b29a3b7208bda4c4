//! Telemetry Reporter: samples playback state on a fixed cadence while the
//! video is playing and posts it to the heartbeat endpoint.
//!
//! Delivery is best-effort: one retry after a fixed delay, then the sample
//! is dropped. Each sample carries the running maximum, so the next tick
//! re-reports anything a dropped sample would have said.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::{HeartbeatReq, HeartbeatResp};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Playback state read from the video surface at sampling time.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackSnapshot {
    pub current_time: f64,
    pub max_viewed_time: f64,
    pub playback_rate: f64,
    pub is_visible: bool,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, payload: &HeartbeatReq) -> anyhow::Result<HeartbeatResp>;
}

/// Posts heartbeats to the ingestion endpoint with the session bearer token.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/heartbeat", base_url.trim_end_matches('/')),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, payload: &HeartbeatReq) -> anyhow::Result<HeartbeatResp> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json::<HeartbeatResp>()
            .await?;
        Ok(resp)
    }
}

pub struct TelemetryReporter<T> {
    lesson_id: Uuid,
    transport: T,
    interval: Duration,
    retry_delay: Duration,
}

impl<T: Transport> TelemetryReporter<T> {
    pub fn new(lesson_id: Uuid, transport: T) -> Self {
        Self {
            lesson_id,
            transport,
            interval: HEARTBEAT_INTERVAL,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_timing(mut self, interval: Duration, retry_delay: Duration) -> Self {
        self.interval = interval;
        self.retry_delay = retry_delay;
        self
    }

    /// Drives the sampling loop until the `playing` channel closes. While
    /// playing, the first sample goes out immediately and then once per
    /// interval; nothing is sent while paused.
    pub async fn run<F>(&self, mut playing: watch::Receiver<bool>, snapshot: F)
    where
        F: Fn() -> PlaybackSnapshot + Send + Sync,
    {
        loop {
            if !*playing.borrow() {
                if playing.changed().await.is_err() {
                    return;
                }
                continue;
            }

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.report(snapshot()).await;
                    }
                    changed = playing.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if !*playing.borrow() {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Sends one sample; retries exactly once after `retry_delay`, then
    /// drops it and relies on the next tick.
    pub async fn report(&self, snapshot: PlaybackSnapshot) -> Option<HeartbeatResp> {
        let payload = HeartbeatReq {
            lesson_id: self.lesson_id,
            current_time: snapshot.current_time.floor(),
            max_viewed_time: snapshot.max_viewed_time.floor(),
            playback_rate: snapshot.playback_rate,
            is_visible: snapshot.is_visible,
        };

        match self.transport.send(&payload).await {
            Ok(ack) => Some(ack),
            Err(first) => {
                tracing::warn!(error = %first, "heartbeat failed, retrying once");
                tokio::time::sleep(self.retry_delay).await;
                match self.transport.send(&payload).await {
                    Ok(ack) => Some(ack),
                    Err(second) => {
                        tracing::warn!(error = %second, "heartbeat retry failed, dropping sample");
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;

    use super::*;

    /// Transport that fails the first `fail_first` calls and records every
    /// payload it was given.
    #[derive(Default)]
    struct ScriptedTransport {
        fail_first: usize,
        calls: AtomicUsize,
        delivered: Mutex<Vec<HeartbeatReq>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, payload: &HeartbeatReq) -> anyhow::Result<HeartbeatResp> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(anyhow!("connection reset"));
            }
            self.delivered.lock().unwrap().push(payload.clone());
            Ok(HeartbeatResp {
                lesson_progress: 0.0,
                course_progress: 0.0,
                max_viewed_time: payload.max_viewed_time as i32,
            })
        }
    }

    fn snapshot() -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_time: 42.9,
            max_viewed_time: 63.2,
            playback_rate: 1.0,
            is_visible: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn payload_is_floored_to_whole_seconds() {
        let reporter = TelemetryReporter::new(Uuid::new_v4(), ScriptedTransport::default());
        reporter.report(snapshot()).await.unwrap();

        let delivered = reporter.transport.delivered.lock().unwrap();
        assert_eq!(delivered[0].current_time, 42.0);
        assert_eq!(delivered[0].max_viewed_time, 63.0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_is_retried_after_the_delay() {
        let transport = ScriptedTransport {
            fail_first: 1,
            ..Default::default()
        };
        let reporter = TelemetryReporter::new(Uuid::new_v4(), transport);

        let ack = reporter.report(snapshot()).await;
        assert!(ack.is_some());
        assert_eq!(reporter.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_drop_the_sample() {
        let transport = ScriptedTransport {
            fail_first: 2,
            ..Default::default()
        };
        let reporter = TelemetryReporter::new(Uuid::new_v4(), transport);

        let ack = reporter.report(snapshot()).await;
        assert!(ack.is_none());
        // Exactly one retry, no unbounded queue.
        assert_eq!(reporter.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn samples_flow_only_while_playing() {
        let reporter = Arc::new(
            TelemetryReporter::new(Uuid::new_v4(), ScriptedTransport::default())
                .with_timing(Duration::from_secs(10), Duration::from_secs(5)),
        );
        let (tx, rx) = watch::channel(false);

        let worker = {
            let reporter = Arc::clone(&reporter);
            tokio::spawn(async move { reporter.run(rx, snapshot).await })
        };

        // Paused: nothing is sent.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(reporter.transport.calls.load(Ordering::SeqCst), 0);

        // Playing: one immediate sample, then one per interval.
        tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(reporter.transport.calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(reporter.transport.calls.load(Ordering::SeqCst), 3);

        // Paused again: the stream stops.
        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let at_pause = reporter.transport.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(reporter.transport.calls.load(Ordering::SeqCst), at_pause);

        drop(tx);
        worker.await.unwrap();
    }
}
