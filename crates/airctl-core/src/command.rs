// ── User intents ──
//
// Everything a presentation layer can ask of the controller. Intents are
// queued on the same channel as load results and push events, so each
// one is applied against a consistent state.

use tokio::sync::oneshot;

use airctl_api::CommandReceipt;

use crate::engine::CommandRequest;
use crate::error::CoreError;
use crate::model::{FanSpeed, Mode};

/// A user action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    SelectHome(Option<i64>),
    SelectDevice(i64),
    SelectMode(Mode),
    SelectFanSpeed(FanSpeed),
    SetTemperature(f64),
    AdjustTemperature(i32),
    /// Stage power on/off without sending it.
    SetPower(bool),
    ResetChanges,
    /// Send the staged state.
    Submit,
    /// Power the selected unit opposite to its confirmed state, now.
    TogglePanelPower,
    /// Power a listed unit on/off from the device list, now.
    QuickToggle(i64),
    /// Reload the device list and the selected device.
    Refresh,
}

impl Intent {
    /// Whether this intent may send a command to the service.
    pub fn sends_command(self) -> bool {
        matches!(
            self,
            Self::Submit | Self::TogglePanelPower | Self::QuickToggle(_)
        )
    }
}

/// What happened to an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentResult {
    /// State updated; nothing was sent.
    Applied,
    /// The intent wasn't legal in the current state (nothing to send,
    /// already submitting, no selection).
    Ignored,
    /// A command was queued by the service.
    Submitted {
        request: CommandRequest,
        receipt: CommandReceipt,
    },
}

impl IntentResult {
    pub fn receipt(&self) -> Option<&CommandReceipt> {
        match self {
            Self::Submitted { receipt, .. } => Some(receipt),
            _ => None,
        }
    }
}

/// Intent paired with the channel its outcome goes back on.
pub(crate) struct IntentEnvelope {
    pub intent: Intent,
    pub response_tx: oneshot::Sender<Result<IntentResult, CoreError>>,
}
