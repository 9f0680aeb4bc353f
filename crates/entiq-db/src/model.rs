//! Model descriptions and their fingerprints.
//!
//! A store records the fingerprint of the model it was created for; the
//! compatibility check compares fingerprints, never structure.

use serde::{Deserialize, Serialize};

use entiq_core::hash::{fingerprint_serde, Fingerprint};
use entiq_core::types::TypeRef;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    entities: Vec<EntityDef>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, def: EntityDef) -> Self {
        self.entities.push(def);
        self
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    /// Stable across runs; changes whenever an entity or field changes.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        Ok(fingerprint_serde(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Model {
        Model::new().entity(
            EntityDef::new("Order")
                .field("id", TypeRef::INT32)
                .field("total", TypeRef::DECIMAL),
        )
    }

    #[test]
    fn fingerprint_tracks_structure() {
        assert_eq!(orders().fingerprint().unwrap(), orders().fingerprint().unwrap());
        let widened = Model::new().entity(
            EntityDef::new("Order")
                .field("id", TypeRef::INT64)
                .field("total", TypeRef::DECIMAL),
        );
        assert_ne!(orders().fingerprint().unwrap(), widened.fingerprint().unwrap());
    }
}
