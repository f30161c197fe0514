use crate::codec::decode_frame;
use crate::errors::AppError;
use crate::model::FieldSnapshot;
use crate::transport;
use crate::ui::{Observer, Subscription, UiEvent, UiHandle};
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use url::Url;

#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub queue_capacity: usize,
    pub reconnect_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            reconnect_delay: Duration::from_millis(2000),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub frames_received: u64,
    pub frames_published: u64,
    pub frames_dropped: u64,
}

/// State shared between the channel and its transport task.
pub(crate) struct Shared {
    slot: watch::Sender<Arc<FieldSnapshot>>,
    ui: UiHandle,
    /// Held across slot update and UI post so the queue order matches the slot.
    publish: Mutex<()>,
    next_sub: AtomicU64,
    received: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl Shared {
    pub(crate) async fn on_frame(&self, raw: &str) {
        self.received.fetch_add(1, Ordering::Relaxed);
        trace!("frame: {}", raw);

        let snap = match decode_frame(raw) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("dropping frame: {}", e);
                return;
            }
        };

        let _guard = self.publish.lock().await;
        // Count before the slot update so stats never trail a visible publish.
        self.published.fetch_add(1, Ordering::Relaxed);
        self.slot.send_replace(Arc::clone(&snap));

        if !self.ui.post(UiEvent::Publish(snap)).await {
            debug!("ui context closed; snapshot not delivered to observers");
        }
    }
}

/// Connection to one telemetry source exposing the most recent snapshot.
///
/// The transport task (if any) lives exactly as long as the channel:
/// dropping the channel closes the socket.
pub struct TelemetryChannel {
    shared: Arc<Shared>,
    endpoint: Option<Url>,
    transport: Option<JoinHandle<()>>,
}

/// Accepts `ws://` and `wss://` URLs with a host.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, AppError> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| AppError::ConnectionSetup(format!("'{}': {}", endpoint, e)))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(AppError::ConnectionSetup(format!(
                "'{}': unsupported scheme '{}'",
                endpoint, other
            )));
        }
    }
    if url.host_str().is_none_or(|h| h.is_empty()) {
        return Err(AppError::ConnectionSetup(format!("'{}': missing host", endpoint)));
    }
    Ok(url)
}

impl TelemetryChannel {
    /// A channel with no transport attached; frames are fed through `on_frame`.
    pub fn new(ui: UiHandle) -> Self {
        let (slot, _) = watch::channel(Arc::new(FieldSnapshot::default()));
        TelemetryChannel {
            shared: Arc::new(Shared {
                slot,
                ui,
                publish: Mutex::new(()),
                next_sub: AtomicU64::new(1),
                received: AtomicU64::new(0),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            endpoint: None,
            transport: None,
        }
    }

    /// Validate `endpoint` and start receiving from it in the background.
    /// Must be called inside a tokio runtime.
    pub fn connect(endpoint: &str, ui: UiHandle, cfg: &ChannelConfig) -> Result<Self, AppError> {
        let url = parse_endpoint(endpoint)?;
        let mut ch = TelemetryChannel::new(ui);
        info!("telemetry: connecting to {}", url);

        let shared = Arc::clone(&ch.shared);
        let t_url = url.clone();
        let delay = cfg.reconnect_delay;
        ch.transport = Some(tokio::spawn(async move {
            transport::run(t_url, shared, delay).await;
        }));
        ch.endpoint = Some(url);
        Ok(ch)
    }

    /// Decode one inbound frame and publish it. Malformed frames are logged and
    /// discarded; the previously published snapshot stays current.
    pub async fn on_frame(&self, raw: &str) {
        self.shared.on_frame(raw).await
    }

    /// Most recently published snapshot, or the zero-valued default.
    pub fn latest(&self) -> Arc<FieldSnapshot> {
        Arc::clone(&self.shared.slot.borrow())
    }

    /// Receiver that wakes on every publish. Intermediate values may be skipped.
    pub fn watch(&self) -> watch::Receiver<Arc<FieldSnapshot>> {
        self.shared.slot.subscribe()
    }

    /// Register `observer` on the UI context. It is called once with the
    /// current snapshot, then once per publish.
    ///
    /// Waits for room in the UI queue, so `UiContext::run` must already be
    /// draining it once more than `queue_capacity` events are outstanding.
    pub async fn subscribe<O: Observer + 'static>(&self, observer: O) -> Subscription {
        let id = self.shared.next_sub.fetch_add(1, Ordering::Relaxed);
        // No publish may land between reading the current value and queueing the attach.
        let _guard = self.shared.publish.lock().await;
        let ev = UiEvent::Attach {
            id,
            observer: Box::new(observer),
            current: self.latest(),
        };
        if !self.shared.ui.post(ev).await {
            debug!("ui context closed; observer #{} never attached", id);
        }
        Subscription { id }
    }

    pub async fn unsubscribe(&self, sub: Subscription) {
        if !self.shared.ui.post(UiEvent::Detach(sub.id)).await {
            debug!("ui context closed; observer #{} already released", sub.id);
        }
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            frames_received: self.shared.received.load(Ordering::Relaxed),
            frames_published: self.shared.published.load(Ordering::Relaxed),
            frames_dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    pub fn transport_running(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the transport. Also happens on drop.
    pub fn close(&mut self) {
        if let Some(t) = self.transport.take() {
            t.abort();
            if let Some(url) = &self.endpoint {
                info!("telemetry: closed {}", url);
            }
        }
    }
}

impl Drop for TelemetryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::frame_json;
    use crate::model::StationId;
    use crate::ui::UiContext;
    use std::sync::Mutex;

    fn detached() -> TelemetryChannel {
        let (ui, handle) = UiContext::new(4);
        drop(ui);
        TelemetryChannel::new(handle)
    }

    #[tokio::test]
    async fn latest_defaults_to_zero_snapshot() {
        let ch = detached();
        assert_eq!(*ch.latest(), FieldSnapshot::default());
        assert_eq!(ch.stats(), ChannelStats::default());
    }

    #[tokio::test]
    async fn valid_frame_replaces_latest() {
        let ch = detached();
        ch.on_frame(&frame_json(12).to_string()).await;

        let snap = ch.latest();
        assert_eq!(snap.match_number, 12);
        assert!(snap[StationId::Blue1].code_running);
        assert_eq!(ch.stats().frames_published, 1);
    }

    #[tokio::test]
    async fn bad_frame_leaves_latest_untouched() {
        let ch = detached();
        ch.on_frame(&frame_json(12).to_string()).await;
        let before = ch.latest();

        let mut frame = frame_json(13);
        frame["blue1"].as_object_mut().unwrap().remove("rio");
        ch.on_frame(&frame.to_string()).await;
        ch.on_frame("garbage").await;

        assert!(Arc::ptr_eq(&before, &ch.latest()));
        assert_eq!(
            ch.stats(),
            ChannelStats { frames_received: 3, frames_published: 1, frames_dropped: 2 }
        );
    }

    #[tokio::test]
    async fn watch_sees_publishes() {
        let ch = detached();
        let mut rx = ch.watch();
        ch.on_frame(&frame_json(7).to_string()).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().match_number, 7);
    }

    #[tokio::test]
    async fn observers_run_on_ui_context_once_per_publish() {
        let (ui, handle) = UiContext::new(16);
        let ch = TelemetryChannel::new(handle);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        let sub = ch
            .subscribe(move |snap: &Arc<FieldSnapshot>| s.lock().unwrap().push(snap.match_number))
            .await;
        ch.on_frame(&frame_json(1).to_string()).await;
        ch.on_frame("{}").await;
        ch.on_frame(&frame_json(2).to_string()).await;
        ch.unsubscribe(sub).await;
        ch.on_frame(&frame_json(3).to_string()).await;
        drop(ch);

        ui.run().await;
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn endpoint_validation() {
        assert!(parse_endpoint("ws://server.filipkin.com:9014/").is_ok());
        assert!(parse_endpoint("wss://example.org/field").is_ok());
        for bad in ["", "server:9014", "http://example.org/", "ws://", "not a url"] {
            assert!(
                matches!(parse_endpoint(bad), Err(AppError::ConnectionSetup(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn connect_rejects_malformed_endpoint() {
        let (_ui, handle) = UiContext::new(4);
        let res = TelemetryChannel::connect("ftp://x", handle, &ChannelConfig::default());
        assert!(matches!(res, Err(AppError::ConnectionSetup(_))));
    }

    #[tokio::test]
    async fn unsubscribe_after_ui_is_gone_returns() {
        let ch = detached();
        let sub = ch.subscribe(|_: &Arc<FieldSnapshot>| {}).await;
        tokio::time::timeout(Duration::from_secs(1), ch.unsubscribe(sub))
            .await
            .expect("unsubscribe hung on a closed ui context");
    }

    #[tokio::test]
    async fn subscribing_with_running_ui_never_waits_on_a_full_queue() {
        let (ui, handle) = UiContext::new(1);
        let ui_task = tokio::spawn(ui.run());
        let ch = TelemetryChannel::new(handle);
        let seen = Arc::new(Mutex::new(Vec::new()));

        tokio::time::timeout(Duration::from_secs(2), async {
            ch.subscribe(|_: &Arc<FieldSnapshot>| {}).await;
            ch.on_frame(&frame_json(1).to_string()).await;
            ch.on_frame(&frame_json(2).to_string()).await;
            let s = Arc::clone(&seen);
            ch.subscribe(move |snap: &Arc<FieldSnapshot>| s.lock().unwrap().push(snap.match_number))
                .await;
            ch.on_frame(&frame_json(3).to_string()).await;
        })
        .await
        .expect("subscribe or publish blocked");

        drop(ch);
        ui_task.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn observers_end_on_the_latest_snapshot_under_concurrency() {
        for _ in 0..50 {
            let (ui, handle) = UiContext::new(4);
            let ui_task = tokio::spawn(ui.run());
            let ch = Arc::new(TelemetryChannel::new(handle));
            let last = Arc::new(Mutex::new(Vec::new()));

            let mut tasks = Vec::new();
            for m in 1..=8 {
                let ch = Arc::clone(&ch);
                let last = Arc::clone(&last);
                tasks.push(tokio::spawn(async move {
                    if m == 4 {
                        // attach mid-stream, racing the publishes
                        ch.subscribe(move |snap: &Arc<FieldSnapshot>| {
                            last.lock().unwrap().push(snap.match_number)
                        })
                        .await;
                    }
                    ch.on_frame(&frame_json(m).to_string()).await;
                }));
            }
            for t in tasks {
                t.await.unwrap();
            }

            let latest = ch.latest().match_number;
            drop(ch);
            ui_task.await.unwrap();
            assert_eq!(last.lock().unwrap().last().copied(), Some(latest));
        }
    }
}
