use std::fmt;
use std::ops::Index;

/// One of the six fixed alliance/position slots on the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StationId {
    Blue1,
    Blue2,
    Blue3,
    Red1,
    Red2,
    Red3,
}

impl StationId {
    /// Wire order. Station arrays in a snapshot are laid out in this order.
    pub const ALL: [StationId; 6] = [
        StationId::Blue1,
        StationId::Blue2,
        StationId::Blue3,
        StationId::Red1,
        StationId::Red2,
        StationId::Red3,
    ];

    /// Key of the nested station document in a frame.
    pub fn key(self) -> &'static str {
        match self {
            StationId::Blue1 => "blue1",
            StationId::Blue2 => "blue2",
            StationId::Blue3 => "blue3",
            StationId::Red1 => "red1",
            StationId::Red2 => "red2",
            StationId::Red3 => "red3",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Driver-station or radio-link health, an index into the 5-entry display palette.
/// 0 means disconnected/bad.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize)]
#[serde(try_from = "i64")]
pub struct StateIndex(u8);

impl StateIndex {
    pub const MAX: u8 = 4;

    pub fn new(v: u8) -> Option<Self> {
        if v <= Self::MAX { Some(StateIndex(v)) } else { None }
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<i64> for StateIndex {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        u8::try_from(v)
            .ok()
            .and_then(StateIndex::new)
            .ok_or_else(|| format!("state {} out of range 0..={}", v, Self::MAX))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StationStatus {
    pub team_number: i32,
    pub driver_station: StateIndex,
    pub radio_link: StateIndex,
    pub controller_present: bool,
    /// Only meaningful when `controller_present`.
    pub code_running: bool,
    pub battery_voltage: f64,
    pub ping_millis: i32,
    pub bandwidth_usage: f64,
    pub packet_count: i32,
}

/// One complete telemetry update. Replaced wholesale on every publish.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSnapshot {
    pub field_index: i32,
    pub match_number: i32,
    /// Display-formatted, e.g. "1:30".
    pub time_remaining: String,
    pub stations: [StationStatus; 6],
}

impl FieldSnapshot {
    pub fn station(&self, id: StationId) -> &StationStatus {
        &self.stations[id.index()]
    }

    pub fn iter_stations(&self) -> impl Iterator<Item = (StationId, &StationStatus)> {
        StationId::ALL.into_iter().zip(self.stations.iter())
    }
}

impl Index<StationId> for FieldSnapshot {
    type Output = StationStatus;

    fn index(&self, id: StationId) -> &StationStatus {
        self.station(id)
    }
}
