//! Identity types shared across the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name of a participating party.
///
/// Everything outside the party registry refers to a party by name only;
/// the party registry owns the actual handle.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyName(pub String);

impl PartyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PartyName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Identifier of one secure compute unit bring-up.
///
/// Minted fresh on every init, so handles from an earlier unit can be
/// told apart from handles of the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(Uuid);

impl UnitId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit:{}", self.0)
    }
}

/// Identifier of a remote object inside a unit's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// Wire identity of a remote object: the unit that owns it plus its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub unit: UnitId,
    pub object: ObjectId,
}

impl ObjectRef {
    pub fn new(unit: UnitId, object: ObjectId) -> Self {
        Self { unit, object }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.unit, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_name_display() {
        let name = PartyName::new("alice");
        assert_eq!(name.to_string(), "alice");
        assert_eq!(name, PartyName::from("alice"));
    }

    #[test]
    fn test_unit_ids_are_unique() {
        assert_ne!(UnitId::generate(), UnitId::generate());
    }

    #[test]
    fn test_object_ref_display() {
        let unit = UnitId::generate();
        let r = ObjectRef::new(unit, ObjectId(7));
        assert!(r.to_string().ends_with("/obj:7"));
    }
}
