// devices/mod.rs
mod memory;
pub use memory::{DEFAULT_HISTORY_LIMIT, ExecutedCommand, InMemoryGateway, SeedError};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DeviceDescriptor, DeviceSnapshot};

/// Runtime view of a registered device.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeStatus {
    pub active: bool,
    /// `None` until the device publishes its first state.
    pub snapshot: Option<DeviceSnapshot>,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("device {0} is not registered")]
    UnknownDevice(String),
    #[error("device configuration could not be updated: {0}")]
    UpdateFailed(String),
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn list_devices(&self) -> Vec<DeviceDescriptor>;

    /// Looks a device up by id, ignoring ASCII case.
    async fn find_device(&self, device_id: &str) -> Option<DeviceDescriptor>;

    async fn runtime_status(&self, device_id: &str) -> Option<RuntimeStatus>;

    async fn snapshot(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.runtime_status(device_id)
            .await
            .and_then(|status| status.snapshot)
    }

    async fn update_location(&self, device_id: &str, location: &str) -> Result<(), RegistryError>;

    async fn update_description(
        &self,
        device_id: &str,
        description: &str,
    ) -> Result<(), RegistryError>;
}
