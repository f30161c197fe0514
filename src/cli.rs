use argparse::{ArgumentParser, Store, StoreOption};
use std::path::PathBuf;

pub const DEFAULT_ENDPOINT: &str = "ws://server.filipkin.com:9014/";

pub struct CliArgs {
    pub endpoint: String,
    pub csv: Option<PathBuf>,
    pub tz: Option<String>,
    pub reconnect_ms: u64,
    pub queue: usize,
    pub log_level: String,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            csv: None,
            tz: None,
            reconnect_ms: 2000,
            queue: 64,
            log_level: "essential".into(),
        }
    }
}

pub fn parse_cli() -> CliArgs {
    let mut args = CliArgs::default();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Live FRC field monitor (websocket telemetry)");
        ap.refer(&mut args.endpoint)
            .add_argument("endpoint", Store, "Telemetry websocket URL (ws:// or wss://)");
        ap.refer(&mut args.csv)
            .add_option(&["--csv"], StoreOption, "Record every snapshot to this CSV file");
        ap.refer(&mut args.tz)
            .add_option(&["--tz"], StoreOption, "Timezone for recorded timestamps (IANA name)");
        ap.refer(&mut args.reconnect_ms)
            .add_option(&["--reconnect-ms"], Store, "Delay before reconnecting, in milliseconds");
        ap.refer(&mut args.queue)
            .add_option(&["--queue"], Store, "Snapshot queue capacity");
        ap.refer(&mut args.log_level)
            .add_option(&["--log"], Store, "Log level (essential|debug|trace|warn|error)");
        ap.parse_args_or_exit();
    }
    args.queue = args.queue.max(1);
    args
}

/// `RUST_LOG`-style default for the `--log` level. The websocket stack only
/// shows its own chatter at `trace`.
pub fn log_filter(level: &str) -> String {
    let ours = match level {
        "debug" | "trace" | "warn" | "error" => level,
        _ => "info",
    };
    let socket = if ours == "trace" { "trace" } else { "warn" };
    format!("{ours},tungstenite={socket},tokio_tungstenite={socket}")
}
