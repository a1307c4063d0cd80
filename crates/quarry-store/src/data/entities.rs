//! Entity identifiers, type descriptors and handles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node property holding the full qualified name of named entities.
pub const FQN_PROPERTY: &str = "fqn";

/// Engine-assigned identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime descriptor of an entity type.
///
/// A type maps to a set of node labels; its name is always the first label.
/// Named types carry a full qualified name which the store uses as the
/// identity cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EntityTypeDef")]
pub struct EntityType {
    name: String,
    labels: Vec<String>,
    named: bool,
}

/// Serialized form of [`EntityType`], normalized on conversion.
#[derive(Deserialize)]
struct EntityTypeDef {
    name: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    named: bool,
}

impl TryFrom<EntityTypeDef> for EntityType {
    type Error = String;

    fn try_from(def: EntityTypeDef) -> Result<Self, Self::Error> {
        if def.name.is_empty() {
            return Err("entity type name must not be empty".to_string());
        }
        let mut entity_type = def.labels.into_iter().fold(Self::new(def.name), Self::with_label);
        entity_type.named = def.named;
        Ok(entity_type)
    }
}

impl EntityType {
    /// A type whose entities carry no full qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            labels: vec![name.clone()],
            name,
            named: false,
        }
    }

    /// A type whose entities are identified by a full qualified name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            named: true,
            ..Self::new(name)
        }
    }

    /// Adds an additional label, e.g. the label of a super type.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    /// True if every label of this type is contained in `labels`.
    pub fn is_satisfied_by(&self, labels: &[String]) -> bool {
        self.labels.iter().all(|label| labels.contains(label))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Handle to a node owned by the store.
///
/// Handles are plain values: properties and relationships are read and
/// written through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEntity {
    id: EntityId,
    entity_type: EntityType,
    full_qualified_name: Option<String>,
}

impl GraphEntity {
    pub fn new(id: EntityId, entity_type: EntityType) -> Self {
        Self {
            id,
            entity_type,
            full_qualified_name: None,
        }
    }

    pub fn named(id: EntityId, entity_type: EntityType, full_qualified_name: impl Into<String>) -> Self {
        Self {
            id,
            entity_type,
            full_qualified_name: Some(full_qualified_name.into()),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// The identity key, present only for entities of a named type.
    pub fn full_qualified_name(&self) -> Option<&str> {
        if self.entity_type.is_named() {
            self.full_qualified_name.as_deref()
        } else {
            None
        }
    }

    pub fn is_named(&self) -> bool {
        self.full_qualified_name().is_some()
    }

    /// True if both handles refer to the same underlying node.
    pub fn same_identity(&self, other: &GraphEntity) -> bool {
        self.id == other.id
    }
}
