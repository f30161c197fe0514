use crate::errors::AppError;
use crate::model::FieldSnapshot;
use crate::ui::Observer;
use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufWriter;
use tokio::sync::mpsc::{Receiver, Sender, error::TrySendError};
use tokio_util::compat::TokioAsyncWriteCompatExt;

pub type Stamped = (DateTime<FixedOffset>, Arc<FieldSnapshot>);

/// Current UTC offset of an IANA zone, fixed for the rest of the session.
pub fn offset_for_zone(name: &str) -> Result<FixedOffset, AppError> {
    let tz: Tz = name
        .parse()
        .map_err(|e| AppError::Config(format!("unknown timezone '{}': {}", name, e)))?;
    Ok(tz.offset_from_utc_datetime(&Utc::now().naive_utc()).fix())
}

/// Observer that timestamps snapshots and hands them to `write_csv_stream`.
/// Never blocks the UI context: a lagging writer loses snapshots.
pub struct SnapshotRecorder {
    tx: Sender<Stamped>,
    tz_offset: Option<FixedOffset>,
    lost: u64,
}

impl SnapshotRecorder {
    pub fn new(tx: Sender<Stamped>, tz_offset: Option<FixedOffset>) -> Self {
        SnapshotRecorder { tx, tz_offset, lost: 0 }
    }

    fn now(&self) -> DateTime<FixedOffset> {
        match self.tz_offset {
            Some(off) => Utc::now().with_timezone(&off),
            None => Local::now().fixed_offset(),
        }
    }
}

impl Observer for SnapshotRecorder {
    fn on_changed(&mut self, snapshot: &Arc<FieldSnapshot>) {
        match self.tx.try_send((self.now(), Arc::clone(snapshot))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.lost += 1;
                warn!("recorder: writer lagging; {} snapshot(s) lost", self.lost);
            }
            Err(TrySendError::Closed(_)) => {
                warn!("recorder: writer gone; snapshot not recorded");
            }
        }
    }
}

const HEADER: [&str; 14] = [
    "received_at",
    "field",
    "match",
    "time",
    "station",
    "team",
    "ds",
    "radio",
    "rio",
    "code",
    "battery",
    "ping",
    "bwu",
    "packets",
];

/// Write one row per station for every snapshot received until `rx` closes.
pub async fn write_csv_stream(out_path: &Path, mut rx: Receiver<Stamped>) -> Result<(), AppError> {
    let file = File::create(out_path)
        .await
        .map_err(|e| AppError::IO(format!("open out csv '{}': {}", out_path.display(), e)))?;
    let writer = BufWriter::new(file);

    let compat_writer = writer.compat_write();
    let mut wtr = csv_async::AsyncWriter::from_writer(compat_writer);

    wtr.write_record(&HEADER)
        .await
        .map_err(|e| AppError::IO(format!("csv write header: {}", e)))?;

    let mut count: usize = 0;

    while let Some((at, snap)) = rx.recv().await {
        let at = at.format("%Y-%m-%d %H:%M:%S%.3f %:z").to_string();
        for (id, st) in snap.iter_stations() {
            let row = [
                at.clone(),
                snap.field_index.to_string(),
                snap.match_number.to_string(),
                snap.time_remaining.clone(),
                id.key().to_string(),
                st.team_number.to_string(),
                st.driver_station.get().to_string(),
                st.radio_link.get().to_string(),
                u8::from(st.controller_present).to_string(),
                u8::from(st.code_running).to_string(),
                st.battery_voltage.to_string(),
                st.ping_millis.to_string(),
                st.bandwidth_usage.to_string(),
                st.packet_count.to_string(),
            ];
            wtr.write_record(&row)
                .await
                .map_err(|e| AppError::IO(format!("csv write row: {}", e)))?;
        }
        count += 1;
    }

    wtr.flush()
        .await
        .map_err(|e| AppError::IO(format!("csv flush: {}", e)))?;

    info!("CSV recorded {} snapshot(s) to {}", count, out_path.display());
    Ok(())
}
