//! Reconciliation core between `airctl-api` and presentation layers.
//!
//! This crate owns the control-panel state machine for AC units:
//!
//! - **[`Engine`]**: pure, synchronous state machine. Holds the selection,
//!   the confirmed (baseline) and staged (control) states, the pending
//!   command registry and the remembered target temperature. Every input
//!   returns the [`Effect`]s the driver has to perform.
//!
//! - **[`Controller`]**: async facade. Serializes user [`Intent`]s, load
//!   results, push events and [`scheduler`] ticks through one queue into
//!   the engine and publishes a [`PanelView`] after each.
//!
//! - **[`normalize()`]**: total mapping from raw device status to a
//!   [`ControlState`] plus ambient reading.
//!
//! - **[`push`]**: typed decoding of `device-update` / `command-error`
//!   server-sent events.
//!
//! - **Collaborator traits** ([`DeviceApi`], [`SessionControl`],
//!   [`SelectionStore`]): the only way the controller reaches the outside
//!   world. `ApiClient` implements the first two.

pub mod command;
pub mod config;
pub mod controller;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pending;
pub mod push;
pub mod scheduler;
pub mod service;
pub mod view;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Intent, IntentResult};
pub use config::{AuthCredentials, ControllerConfig, TlsVerification};
pub use controller::{Collaborators, Controller};
pub use engine::{CommandKind, CommandRequest, Effect, Engine, FetchStatus, Notice};
pub use error::CoreError;
pub use normalize::{Normalized, normalize};
pub use pending::{PendingCommand, PendingCommands};
pub use push::{CommandFailure, DeviceUpdate, PushEvent};
pub use scheduler::RefreshRequest;
pub use service::{DeviceApi, MemorySelectionStore, SelectionStore, SessionControl};
pub use view::PanelView;

pub use model::{
    Accent, ControlState, DeviceCommand, DeviceStatus, FanSpeed, Home, Mode, SelectionContext,
    DEFAULT_TEMPERATURE, TEMPERATURE_MAX, TEMPERATURE_MIN,
};

// Wire-level types consumers see through the controller.
pub use airctl_api::{CommandReceipt, LinkStatus};
