use crate::model::{FieldSnapshot, StateIndex, StationId, StationStatus};
use crate::ui::Observer;
use log::warn;
use std::io::Write;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Green,
    Yellow,
}

impl Color {
    pub fn tag(self) -> &'static str {
        match self {
            Color::Red => "RED",
            Color::Green => "GRN",
            Color::Yellow => "YEL",
        }
    }
}

/// Shared 5-entry palette for driver-station and radio states.
pub const PALETTE: [Color; 5] = [Color::Red, Color::Green, Color::Green, Color::Yellow, Color::Yellow];

const STATE_LABELS: [&str; 5] = ["X", "OK", "OK", "!", "!"];

#[inline]
pub fn state_color(s: StateIndex) -> Color {
    PALETTE[s.get()]
}

#[inline]
pub fn state_label(s: StateIndex) -> &'static str {
    STATE_LABELS[s.get()]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerStatus {
    NoController,
    NoCode,
    Running,
}

impl ControllerStatus {
    /// `code` is ignored when no controller is present.
    pub fn of(st: &StationStatus) -> Self {
        match (st.controller_present, st.code_running) {
            (false, _) => ControllerStatus::NoController,
            (true, false) => ControllerStatus::NoCode,
            (true, true) => ControllerStatus::Running,
        }
    }

    pub fn color(self) -> Color {
        match self {
            ControllerStatus::NoController => PALETTE[0],
            ControllerStatus::NoCode => PALETTE[3],
            ControllerStatus::Running => PALETTE[1],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StationView {
    pub station: StationId,
    pub team: String,
    pub ds_color: Color,
    pub ds_label: &'static str,
    pub radio_color: Color,
    pub rio_color: Color,
    pub battery: String,
    pub ping: String,
    pub bwu: String,
}

impl StationView {
    fn new(station: StationId, st: &StationStatus) -> Self {
        StationView {
            station,
            team: st.team_number.to_string(),
            ds_color: state_color(st.driver_station),
            ds_label: state_label(st.driver_station),
            radio_color: state_color(st.radio_link),
            rio_color: ControllerStatus::of(st).color(),
            battery: format!("{:.2}V", st.battery_voltage),
            ping: format!("{}ms", st.ping_millis),
            bwu: format!("{:.2}Mb", st.bandwidth_usage),
        }
    }
}

/// Display strings for one snapshot, ready to paint.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorView {
    pub match_label: String,
    pub field_state: String,
    pub time: String,
    pub stations: Vec<StationView>,
}

impl MonitorView {
    pub fn from_snapshot(snap: &FieldSnapshot) -> Self {
        MonitorView {
            match_label: format!("Match {}", snap.match_number),
            field_state: format!("field state {}", snap.field_index),
            time: snap.time_remaining.clone(),
            stations: snap.iter_stations().map(|(id, st)| StationView::new(id, st)).collect(),
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "{} | {} | {}", self.match_label, self.field_state, self.time)?;
        for s in &self.stations {
            writeln!(
                w,
                "  {:<5} {:>5}  DS[{} {:<2}] RADIO[{}] RIO[{}]  {:>7} {:>6} {:>7}",
                s.station.key(),
                s.team,
                s.ds_color.tag(),
                s.ds_label,
                s.radio_color.tag(),
                s.rio_color.tag(),
                s.battery,
                s.ping,
                s.bwu,
            )?;
        }
        w.flush()
    }
}

/// Repaints the monitor on every published snapshot.
pub struct TerminalBinder<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalBinder<W> {
    pub fn new(out: W) -> Self {
        TerminalBinder { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Observer for TerminalBinder<W> {
    fn on_changed(&mut self, snapshot: &Arc<FieldSnapshot>) {
        if let Err(e) = MonitorView::from_snapshot(snapshot).write_to(&mut self.out) {
            warn!("binder: render failed: {}", e);
        }
    }
}
