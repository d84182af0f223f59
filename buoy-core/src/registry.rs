//! Master-side peer registry: append-only, id = insertion index.

use std::fmt;

use serde::Serialize;

use crate::address::HardwareAddress;
use crate::protocol::BuoyId;

/// One known slave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub id: BuoyId,
    pub name: String,
    pub address: HardwareAddress,
}

impl RegistryEntry {
    fn new(id: BuoyId, address: HardwareAddress) -> Self {
        Self {
            id,
            name: display_name(id),
            address,
        }
    }
}

/// Name shown for a buoy in the registry dump.
pub fn display_name(id: BuoyId) -> String {
    format!("Buoy n°{}", id)
}

/// Slaves known to the master, in order of first contact.
#[derive(Debug, Default, Clone)]
pub struct PeerRegistry {
    entries: Vec<RegistryEntry>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Id of the entry registered for `address`, if any.
    pub fn find(&self, address: &HardwareAddress) -> Option<BuoyId> {
        self.entries
            .iter()
            .find(|e| e.address == *address)
            .map(|e| e.id)
    }

    /// Append `address` with the next sequential id. The address must not be registered yet.
    pub fn register(&mut self, address: HardwareAddress) -> Result<BuoyId, RegistryError> {
        if let Some(id) = self.find(&address) {
            return Err(RegistryError::AlreadyRegistered { address, id });
        }
        let id = BuoyId::try_from(self.entries.len()).map_err(|_| RegistryError::Full)?;
        self.entries.push(RegistryEntry::new(id, address));
        Ok(id)
    }

    /// Existing id for `address`, or a fresh one. The flag is true when the entry was just created.
    pub fn lookup_or_register(
        &mut self,
        address: HardwareAddress,
    ) -> Result<(BuoyId, bool), RegistryError> {
        match self.find(&address) {
            Some(id) => Ok((id, false)),
            None => self.register(address).map(|id| (id, true)),
        }
    }

    pub fn get(&self, id: BuoyId) -> Option<&RegistryEntry> {
        usize::try_from(id).ok().and_then(|i| self.entries.get(i))
    }

    /// Entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }
}

/// Operator-facing dump, one block per entry.
impl fmt::Display for PeerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------------- ID LIST -------------")?;
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "buoyID : {}", e.id)?;
            writeln!(f, "buoyName : {}", e.name)?;
            writeln!(f, "buoyMacAddress : {}", e.address)?;
        }
        write!(f, "-----------------------------------")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{address} is already registered as {id}")]
    AlreadyRegistered { address: HardwareAddress, id: BuoyId },
    #[error("registry has no ids left")]
    Full,
}
