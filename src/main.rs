mod cli;

use field_monitor::{AppError, ChannelConfig, TelemetryChannel, binder, recorder, ui};
use env_logger::Env;
use log::{info, warn};
use std::time::Duration;
use tokio::sync::mpsc;

fn setup_logging(level: &str) {
    let env = Env::default().filter_or("RUST_LOG", cli::log_filter(level));
    env_logger::Builder::from_env(env).format_timestamp_millis().init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), AppError> {
    let args = cli::parse_cli();
    setup_logging(&args.log_level);
    info!("Starting: monitoring {}", args.endpoint);

    let cfg = ChannelConfig {
        queue_capacity: args.queue,
        reconnect_delay: Duration::from_millis(args.reconnect_ms),
    };

    // The UI context must be draining before anything is subscribed.
    let (ui, ui_handle) = ui::UiContext::new(cfg.queue_capacity);
    let mut ui_task = tokio::spawn(ui.run());
    let channel = TelemetryChannel::connect(&args.endpoint, ui_handle, &cfg)?;

    channel.subscribe(binder::TerminalBinder::new(std::io::stdout())).await;

    let sink = match args.csv.clone() {
        Some(out_path) => {
            let tz_offset = args.tz.as_deref().and_then(|name| match recorder::offset_for_zone(name) {
                Ok(off) => Some(off),
                Err(e) => {
                    warn!("{}; recording in local time", e);
                    None
                }
            });
            let (tx, rx) = mpsc::channel::<recorder::Stamped>(cfg.queue_capacity);
            channel.subscribe(recorder::SnapshotRecorder::new(tx, tz_offset)).await;
            Some(tokio::spawn(async move {
                recorder::write_csv_stream(out_path.as_path(), rx).await
            }))
        }
        None => None,
    };

    let ui_done = tokio::select! {
        res = &mut ui_task => {
            if let Err(e) = res {
                warn!("ui context stopped: {}", e);
            }
            true
        }
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("signal handler failed: {}", e);
            }
            info!("Interrupted");
            false
        }
    };

    let stats = channel.stats();
    // Last UI handle goes with the channel; the UI context drains and releases its observers.
    drop(channel);
    if !ui_done {
        if let Err(e) = ui_task.await {
            warn!("ui context join: {}", e);
        }
    }
    info!(
        "Frames: {} received, {} published, {} dropped",
        stats.frames_received, stats.frames_published, stats.frames_dropped
    );

    if let Some(sink) = sink {
        sink.await
            .unwrap_or_else(|e| Err(AppError::IO(format!("recorder join: {e}"))))?;
    }

    info!("Done.");
    Ok(())
}
