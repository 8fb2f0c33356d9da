// airctl-api: Async Rust client for the AC device-control service
//
// REST endpoints (homes, devices, mode commands), session auth, and the
// server-sent event stream that carries command outcomes.

pub mod auth;
pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod transport;

pub use auth::Session;
pub use client::ApiClient;
pub use error::Error;
pub use events::{EventStreamHandle, LinkStatus, RawEvent, ReconnectConfig, StreamEvent};
pub use models::{
    AuthUser, CommandReceipt, DeviceStatusDto, FanSetting, HomeSummary, ModeSetting,
    UpdateModePayload,
};
pub use transport::{TlsMode, TransportConfig};
