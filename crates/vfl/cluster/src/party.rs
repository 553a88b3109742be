//! Party registry
//!
//! The registry is the single owner of every [`PartyHandle`]. Stages and
//! handles refer to parties by [`PartyName`] and resolve through the
//! registry when they need an address.

use std::collections::BTreeMap;
use vfl_types::{ClusterConfig, ClusterInitError, PartyName, UnitError};

/// Capability of a participating party: a named, addressable process
pub trait Party: Send + Sync {
    fn name(&self) -> &PartyName;

    /// Address other parties dial
    fn address(&self) -> &str;

    /// Address this party binds to
    fn listen_addr(&self) -> &str;
}

/// Per-party virtual device, immutable once registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyHandle {
    name: PartyName,
    address: String,
    listen_addr: String,
}

impl PartyHandle {
    pub fn new(
        name: PartyName,
        address: impl Into<String>,
        listen_addr: impl Into<String>,
    ) -> Result<Self, ClusterInitError> {
        let address = address.into();
        let listen_addr = listen_addr.into();
        validate_address(name.as_str(), &address)?;
        validate_address(name.as_str(), &listen_addr)?;
        Ok(Self {
            name,
            address,
            listen_addr,
        })
    }
}

impl Party for PartyHandle {
    fn name(&self) -> &PartyName {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn listen_addr(&self) -> &str {
        &self.listen_addr
    }
}

/// Check that `address` has the form `host:port`
pub fn validate_address(party: &str, address: &str) -> Result<(), ClusterInitError> {
    let invalid = || ClusterInitError::InvalidAddress {
        party: party.to_string(),
        address: address.to_string(),
    };

    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    if host.trim().is_empty() || host.contains(char::is_whitespace) {
        return Err(invalid());
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(invalid()),
    }
}

/// Ordered map of registered parties plus the party this process acts for
#[derive(Debug, Clone)]
pub struct PartyRegistry {
    parties: BTreeMap<PartyName, PartyHandle>,
    self_party: PartyName,
}

impl PartyRegistry {
    /// Build the registry from the cluster section of the configuration
    pub fn from_config(config: &ClusterConfig) -> Result<Self, ClusterInitError> {
        let mut parties = BTreeMap::new();
        for (name, party) in &config.parties {
            let handle = PartyHandle::new(name.clone(), &party.address, &party.listen_addr)?;
            parties.insert(name.clone(), handle);
        }

        if !parties.contains_key(&config.self_party) {
            return Err(ClusterInitError::UnknownParty(
                config.self_party.to_string(),
            ));
        }

        Ok(Self {
            parties,
            self_party: config.self_party.clone(),
        })
    }

    pub fn get(&self, name: &PartyName) -> Result<&PartyHandle, UnitError> {
        self.parties
            .get(name)
            .ok_or_else(|| UnitError::UnknownParty(name.clone()))
    }

    pub fn contains(&self, name: &PartyName) -> bool {
        self.parties.contains_key(name)
    }

    pub fn self_party(&self) -> &PartyName {
        &self.self_party
    }

    /// Registered party names in order
    pub fn names(&self) -> impl Iterator<Item = &PartyName> {
        self.parties.keys()
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }
}
