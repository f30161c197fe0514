//! Live field telemetry: a websocket channel that decodes whole-field
//! snapshots and publishes them to observers on a single UI context.

pub mod binder;
pub mod channel;
pub mod codec;
pub mod errors;
pub mod model;
pub mod recorder;
mod transport;
pub mod ui;

pub use channel::{ChannelConfig, ChannelStats, TelemetryChannel};
pub use errors::AppError;
pub use model::{FieldSnapshot, StateIndex, StationId, StationStatus};
pub use ui::{Observer, Subscription, UiContext, UiHandle};
