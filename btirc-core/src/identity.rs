//! Device identity: stable address plus a friendly name whose lookup may fail.

use crate::transport::{Device, TransportError};

/// Resolved identity of a device. `name` keeps the lookup error so callers decide how to
/// report it; resolution itself never fails.
#[derive(Debug)]
pub struct Identity {
    pub address: String,
    pub name: Result<String, TransportError>,
}

impl Identity {
    /// `name - address`, or just the address when the name could not be resolved.
    pub fn label(&self) -> String {
        match &self.name {
            Ok(name) => format!("{} - {}", name, self.address),
            Err(_) => self.address.clone(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().ok()
    }
}

/// Query a device for its address and friendly name. Pure query; nothing is cached.
pub async fn resolve<D: Device + ?Sized>(device: &D) -> Identity {
    let address = device.address();
    let name = device.friendly_name().await;
    Identity { address, name }
}
