// devices/memory.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DeviceRegistry, RegistryError, RuntimeStatus};
use crate::{
    commands::{CommandExecutor, CommandValue, ExecutorError},
    models::{DeviceDescriptor, DeviceSnapshot, DeviceState},
};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("failed to read device seed {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid device seed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate device id {0}")]
    DuplicateDevice(String),
}

/// Executed commands kept per device unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedCommand {
    pub id: Uuid,
    pub command: String,
    pub args: Vec<CommandValue>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeedFile {
    #[serde(default)]
    devices: Vec<SeedDevice>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SeedDevice {
    #[serde(flatten)]
    descriptor: DeviceDescriptor,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    states: Option<DeviceSnapshot>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug)]
struct DeviceEntry {
    descriptor: DeviceDescriptor,
    active: bool,
    snapshot: Option<DeviceSnapshot>,
    history: VecDeque<ExecutedCommand>,
}

/// Device registry and command executor kept in memory.
///
/// Descriptor updates can be written back to a seed file with
/// [`InMemoryGateway::persist_to`]; a failed write rolls the update back.
#[derive(Debug)]
pub struct InMemoryGateway {
    devices: DashMap<String, DeviceEntry>,
    history_limit: usize,
    seed_path: Option<PathBuf>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self {
            devices: DashMap::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            seed_path: None,
        }
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `limit` executed commands per device, dropping the oldest.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn persist_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_path = Some(path.into());
        self
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SeedError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let gateway = Self::from_json(&json)?;
        info!(devices = gateway.len(), path = %path.display(), "Device seed loaded");
        Ok(gateway)
    }

    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        let seed: SeedFile = serde_json::from_str(json)?;
        let gateway = Self::new();
        for device in seed.devices {
            let id = device.descriptor.id.clone();
            gateway.register(device.descriptor, device.active)?;
            if let Some(snapshot) = device.states {
                if let Some(mut entry) = gateway.devices.get_mut(&id) {
                    entry.snapshot = Some(snapshot);
                }
            }
        }
        Ok(gateway)
    }

    pub fn register(&self, descriptor: DeviceDescriptor, active: bool) -> Result<(), SeedError> {
        match self.devices.entry(descriptor.id.clone()) {
            Entry::Occupied(_) => Err(SeedError::DuplicateDevice(descriptor.id)),
            Entry::Vacant(slot) => {
                debug!(device_id = %descriptor.id, "Device registered");
                slot.insert(DeviceEntry {
                    descriptor,
                    active,
                    snapshot: None,
                    history: VecDeque::new(),
                });
                Ok(())
            }
        }
    }

    /// Replaces one named state of a device's snapshot.
    pub fn publish_state(
        &self,
        device_id: &str,
        name: impl Into<String>,
        state: DeviceState,
    ) -> Result<(), RegistryError> {
        let mut entry = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| RegistryError::UnknownDevice(device_id.to_string()))?;
        entry
            .snapshot
            .get_or_insert_with(DeviceSnapshot::default)
            .states
            .insert(name.into(), state);
        Ok(())
    }

    pub fn set_active(&self, device_id: &str, active: bool) -> Result<(), RegistryError> {
        let mut entry = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| RegistryError::UnknownDevice(device_id.to_string()))?;
        entry.active = active;
        Ok(())
    }

    pub fn history(&self, device_id: &str) -> Vec<ExecutedCommand> {
        self.devices
            .get(device_id)
            .map(|entry| entry.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    async fn update_descriptor(
        &self,
        device_id: &str,
        apply: impl FnOnce(&mut DeviceDescriptor),
    ) -> Result<(), RegistryError> {
        let previous = {
            let mut entry = self
                .devices
                .get_mut(device_id)
                .ok_or_else(|| RegistryError::UnknownDevice(device_id.to_string()))?;
            let previous = entry.descriptor.clone();
            apply(&mut entry.descriptor);
            previous
        };

        if let Err(err) = self.persist().await {
            warn!(device_id, error = %err, "Rolling back device update");
            if let Some(mut entry) = self.devices.get_mut(device_id) {
                entry.descriptor = previous;
            }
            return Err(err);
        }
        Ok(())
    }

    async fn persist(&self) -> Result<(), RegistryError> {
        let Some(path) = &self.seed_path else {
            return Ok(());
        };

        let mut devices: Vec<SeedDevice> = self
            .devices
            .iter()
            .map(|entry| SeedDevice {
                descriptor: entry.descriptor.clone(),
                active: entry.active,
                states: entry.snapshot.clone(),
            })
            .collect();
        devices.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));

        let json = serde_json::to_string_pretty(&SeedFile { devices })
            .map_err(|e| RegistryError::UpdateFailed(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| RegistryError::UpdateFailed(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Device configuration saved");
        Ok(())
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryGateway {
    async fn list_devices(&self) -> Vec<DeviceDescriptor> {
        let mut devices: Vec<_> = self
            .devices
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    async fn find_device(&self, device_id: &str) -> Option<DeviceDescriptor> {
        if let Some(entry) = self.devices.get(device_id) {
            return Some(entry.descriptor.clone());
        }
        self.devices
            .iter()
            .find(|entry| entry.key().eq_ignore_ascii_case(device_id))
            .map(|entry| entry.descriptor.clone())
    }

    async fn runtime_status(&self, device_id: &str) -> Option<RuntimeStatus> {
        self.devices.get(device_id).map(|entry| RuntimeStatus {
            active: entry.active,
            snapshot: entry.snapshot.clone(),
        })
    }

    async fn update_location(&self, device_id: &str, location: &str) -> Result<(), RegistryError> {
        self.update_descriptor(device_id, |descriptor| {
            descriptor.is_in = Some(location.to_string());
        })
        .await?;
        info!(device_id, location, "Device location updated");
        Ok(())
    }

    async fn update_description(
        &self,
        device_id: &str,
        description: &str,
    ) -> Result<(), RegistryError> {
        self.update_descriptor(device_id, |descriptor| {
            descriptor.description = Some(description.to_string());
        })
        .await?;
        info!(device_id, "Device description updated");
        Ok(())
    }
}

#[async_trait]
impl CommandExecutor for InMemoryGateway {
    async fn execute(
        &self,
        device_id: &str,
        command: &str,
        args: Vec<CommandValue>,
    ) -> Result<(), ExecutorError> {
        let mut entry = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| ExecutorError::UnknownDevice(device_id.to_string()))?;

        if !entry.active {
            return Err(ExecutorError::Rejected(format!(
                "device {device_id} is not active"
            )));
        }
        if !entry.descriptor.accepts(command) {
            return Err(ExecutorError::UnsupportedCommand {
                device: device_id.to_string(),
                command: command.to_string(),
            });
        }

        entry.history.push_back(ExecutedCommand {
            id: Uuid::new_v4(),
            command: command.to_string(),
            args,
            executed_at: Utc::now(),
        });
        while entry.history.len() > self.history_limit {
            entry.history.pop_front();
        }
        Ok(())
    }
}
