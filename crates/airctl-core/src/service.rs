// ── Collaborator seams ──
//
// The controller talks to the outside world only through these traits:
// the device service, the session owner and the selection store. The
// real implementations wrap `ApiClient`; tests plug in fakes.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use airctl_api::{ApiClient, CommandReceipt, UpdateModePayload};

use crate::error::CoreError;
use crate::model::{DeviceCommand, DeviceStatus, Home, SelectionContext};

/// Read and command access to homes and devices.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn fetch_homes(&self) -> Result<Vec<Home>, CoreError>;

    async fn fetch_devices(&self, home_id: i64) -> Result<Vec<DeviceStatus>, CoreError>;

    async fn fetch_device_status(
        &self,
        home_id: i64,
        device_id: i64,
    ) -> Result<Option<DeviceStatus>, CoreError>;

    /// Queue a command. Fails with `Unauthorized` or `CommandRejected`.
    async fn submit_device_command(
        &self,
        device_id: i64,
        command: &DeviceCommand,
    ) -> Result<CommandReceipt, CoreError>;
}

/// Owner of the login session.
#[async_trait]
pub trait SessionControl: Send + Sync {
    async fn logout(&self) -> Result<(), CoreError>;
}

/// Where the `{homeId, deviceId}` selection survives restarts.
pub trait SelectionStore: Send + Sync {
    /// `None` when nothing (valid) has been stored.
    fn read(&self) -> Option<SelectionContext>;

    fn write(&self, selection: SelectionContext) -> Result<(), CoreError>;
}

// ── ApiClient ───────────────────────────────────────────────────────

#[async_trait]
impl DeviceApi for ApiClient {
    async fn fetch_homes(&self) -> Result<Vec<Home>, CoreError> {
        let homes = ApiClient::fetch_homes(self).await?;
        Ok(homes.into_iter().map(Home::from).collect())
    }

    async fn fetch_devices(&self, home_id: i64) -> Result<Vec<DeviceStatus>, CoreError> {
        let devices = ApiClient::fetch_devices(self, home_id).await?;
        Ok(devices.into_iter().map(DeviceStatus::from).collect())
    }

    async fn fetch_device_status(
        &self,
        home_id: i64,
        device_id: i64,
    ) -> Result<Option<DeviceStatus>, CoreError> {
        let device = ApiClient::fetch_device_status(self, home_id, device_id).await?;
        Ok(device.map(DeviceStatus::from))
    }

    async fn submit_device_command(
        &self,
        device_id: i64,
        command: &DeviceCommand,
    ) -> Result<CommandReceipt, CoreError> {
        let payload = UpdateModePayload::from(command);
        self.update_device_mode(device_id, &payload)
            .await
            .map_err(|err| match err {
                airctl_api::Error::Api { status, message } if status != 401 => {
                    CoreError::CommandRejected { message }
                }
                other => other.into(),
            })
    }
}

#[async_trait]
impl SessionControl for ApiClient {
    async fn logout(&self) -> Result<(), CoreError> {
        ApiClient::logout(self).await.map_err(CoreError::from)
    }
}

// ── In-memory store ─────────────────────────────────────────────────

/// Selection store that forgets everything on exit.
#[derive(Debug, Default)]
pub struct MemorySelectionStore {
    selection: Mutex<Option<SelectionContext>>,
}

impl MemorySelectionStore {
    pub fn new(initial: Option<SelectionContext>) -> Self {
        Self {
            selection: Mutex::new(initial),
        }
    }
}

impl SelectionStore for MemorySelectionStore {
    fn read(&self) -> Option<SelectionContext> {
        *self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, selection: SelectionContext) -> Result<(), CoreError> {
        *self.selection.lock().unwrap_or_else(PoisonError::into_inner) = Some(selection);
        Ok(())
    }
}
