use crate::errors::AppError;
use crate::model::{FieldSnapshot, StateIndex, StationId, StationStatus};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Nested per-station document as it appears on the wire.
#[derive(Deserialize, Debug)]
struct StationDoc {
    number: i32,
    ds: StateIndex,
    radio: StateIndex,
    rio: i32,
    code: i32,
    bwu: f64,
    battery: f64,
    ping: i32,
    packets: i32,
}

impl From<StationDoc> for StationStatus {
    fn from(d: StationDoc) -> Self {
        StationStatus {
            team_number: d.number,
            driver_station: d.ds,
            radio_link: d.radio,
            controller_present: d.rio != 0,
            code_running: d.code != 0,
            battery_voltage: d.battery,
            ping_millis: d.ping,
            bandwidth_usage: d.bwu,
            packet_count: d.packets,
        }
    }
}

#[inline]
fn take<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Result<T, AppError> {
    let v = obj
        .get(key)
        .ok_or_else(|| AppError::FrameDecode(format!("missing key '{}'", key)))?;
    T::deserialize(v).map_err(|e| AppError::FrameDecode(format!("key '{}': {}", key, e)))
}

/// Decode one inbound text frame into a complete snapshot.
/// All-or-nothing: any missing key or type mismatch fails the whole frame.
pub fn decode_frame(raw: &str) -> Result<FieldSnapshot, AppError> {
    let doc: Value = serde_json::from_str(raw.trim_start_matches('\u{FEFF}'))
        .map_err(|e| AppError::FrameDecode(format!("malformed document: {}", e)))?;
    let obj = doc
        .as_object()
        .ok_or_else(|| AppError::FrameDecode("frame is not an object".into()))?;

    let field_index: i32 = take(obj, "field")?;
    let match_number: i32 = take(obj, "match")?;
    let time_remaining: String = take(obj, "time")?;

    let mut stations = [StationStatus::default(); 6];
    for id in StationId::ALL {
        let doc: StationDoc = take(obj, id.key())?;
        stations[id.index()] = doc.into();
    }

    Ok(FieldSnapshot {
        field_index,
        match_number,
        time_remaining,
        stations,
    })
}
