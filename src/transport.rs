use crate::channel::Shared;
use crate::errors::AppError;
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Receive loop for one endpoint. Reconnects after `delay` whenever the
/// socket closes or fails; runs until the owning channel aborts it.
pub(crate) async fn run(url: Url, shared: Arc<Shared>, delay: Duration) {
    let mut attempt: u64 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match session(&url, &shared).await {
            Ok(frames) => info!("telemetry: {} closed after {} frame(s)", url, frames),
            Err(e) => warn!("telemetry: {} (attempt {}): {}", url, attempt, e),
        }
        debug!("telemetry: reconnecting in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

/// One connection: connect, then feed every text message to the channel.
/// Returns the number of frames handed over before the peer closed.
async fn session(url: &Url, shared: &Shared) -> Result<u64, AppError> {
    let (mut ws, _resp) = connect_async(url.as_str())
        .await
        .map_err(|e| AppError::Transport(format!("connect: {}", e)))?;
    info!("telemetry: connected to {}", url);

    let mut frames: u64 = 0;
    while let Some(msg) = ws.next().await {
        let msg = msg.map_err(|e| AppError::Transport(format!("read: {}", e)))?;
        match msg {
            Message::Text(text) => {
                shared.on_frame(&text).await;
                frames += 1;
            }
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    shared.on_frame(text).await;
                    frames += 1;
                }
                Err(_) => warn!("telemetry: dropping non-UTF-8 binary message ({} bytes)", data.len()),
            },
            Message::Close(frame) => {
                debug!("telemetry: close frame {:?}", frame);
                break;
            }
            // ping/pong are answered by tungstenite
            _ => {}
        }
    }
    Ok(frames)
}
