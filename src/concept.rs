//! Identifiers and the concept kind lattice.
//!
//! A *concept* is any typed element of the graph, schema or data. Every proxy
//! in this crate, whether a frozen [`crate::local::LocalConcept`] snapshot or
//! a live [`crate::remote::RemoteConcept`] handle, is identified by a
//! [`ConceptId`] and carries exactly one [`ConceptKind`], fixed at
//! construction. Identity comparison is always `(id, kind)`.

use std::fmt;
use std::hash::BuildHasherDefault;

use seahash::SeaHasher;
use serde::{Deserialize, Serialize};

use crate::error::{GraphlingError, Result};

/// Hasher for maps and sets keyed by concept identity.
pub type ConceptIdHasher = BuildHasherDefault<SeaHasher>;

// ------------- ConceptId -------------

/// Opaque unique key of a concept within a database instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptId(String);

impl ConceptId {
    pub fn of(id: impl Into<String>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------- Label -------------

/// Human-readable name of a schema concept. Unique among sibling schema
/// concepts of compatible kind. Relabeling is possible on types only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label(String);

impl Label {
    pub fn of(label: impl Into<String>) -> Self {
        Self(label.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------- ConceptKind -------------

/// The closed set of concept kinds. The wire protocol carries these as raw
/// codes; an unknown code is a protocol violation, never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConceptKind {
    Entity,
    Relation,
    Attribute,
    EntityType,
    RelationType,
    AttributeType,
    Role,
    Rule,
    MetaType,
}

impl ConceptKind {
    pub const ALL: [ConceptKind; 9] = [
        ConceptKind::Entity,
        ConceptKind::Relation,
        ConceptKind::Attribute,
        ConceptKind::EntityType,
        ConceptKind::RelationType,
        ConceptKind::AttributeType,
        ConceptKind::Role,
        ConceptKind::Rule,
        ConceptKind::MetaType,
    ];

    /// The stable discriminant used on the wire.
    pub fn code(&self) -> u8 {
        match self {
            ConceptKind::Entity => 1,
            ConceptKind::Relation => 2,
            ConceptKind::Attribute => 3,
            ConceptKind::EntityType => 4,
            ConceptKind::RelationType => 5,
            ConceptKind::AttributeType => 6,
            ConceptKind::Role => 7,
            ConceptKind::Rule => 8,
            ConceptKind::MetaType => 9,
        }
    }

    pub fn from_code(code: u8) -> Result<ConceptKind> {
        match code {
            1 => Ok(ConceptKind::Entity),
            2 => Ok(ConceptKind::Relation),
            3 => Ok(ConceptKind::Attribute),
            4 => Ok(ConceptKind::EntityType),
            5 => Ok(ConceptKind::RelationType),
            6 => Ok(ConceptKind::AttributeType),
            7 => Ok(ConceptKind::Role),
            8 => Ok(ConceptKind::Rule),
            9 => Ok(ConceptKind::MetaType),
            unknown => Err(GraphlingError::ProtocolViolation(format!(
                "unrecognized concept kind code {unknown}"
            ))),
        }
    }

    /// Data instances: entities, relations and attributes.
    pub fn is_thing(&self) -> bool {
        matches!(
            self,
            ConceptKind::Entity | ConceptKind::Relation | ConceptKind::Attribute
        )
    }

    /// Schema concepts that can be instantiated or played.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            ConceptKind::EntityType
                | ConceptKind::RelationType
                | ConceptKind::AttributeType
                | ConceptKind::Role
                | ConceptKind::MetaType
        )
    }

    /// Anything describing structure rather than data.
    pub fn is_schema_concept(&self) -> bool {
        !self.is_thing()
    }
}

impl fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ConceptKind::Entity => "Entity",
            ConceptKind::Relation => "Relation",
            ConceptKind::Attribute => "Attribute",
            ConceptKind::EntityType => "EntityType",
            ConceptKind::RelationType => "RelationType",
            ConceptKind::AttributeType => "AttributeType",
            ConceptKind::Role => "Role",
            ConceptKind::Rule => "Rule",
            ConceptKind::MetaType => "MetaType",
        };
        write!(f, "{name}")
    }
}

// ------------- Concept -------------

/// Common surface of every concept proxy, on both bindings.
///
/// Two proxies referring to the same server-side element compare equal on
/// `(id, kind)` regardless of when or how they were obtained.
pub trait Concept {
    fn id(&self) -> &ConceptId;
    fn kind(&self) -> ConceptKind;
}
