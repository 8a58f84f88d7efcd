//! Local concepts: frozen, fully-decoded snapshots.
//!
//! A local concept is decoded once from a [`ConceptMessage`] at construction
//! time and never re-fetches; its accessors return the cached data as of the
//! moment of receipt. This makes local concepts free to read but potentially
//! stale. The live counterpart lives in [`crate::remote`].

use std::hash::{Hash, Hasher};

use crate::codec::ConceptMessage;
use crate::concept::{Concept, ConceptId, ConceptKind, Label};
use crate::datatype::{DataType, Value};
use crate::error::{GraphlingError, Result};

fn require<T>(field: Option<T>, kind: ConceptKind, name: &str) -> Result<T> {
    field.ok_or_else(|| {
        GraphlingError::ProtocolViolation(format!("{kind} message missing {name} field"))
    })
}

// ------------- Snapshots -------------

#[derive(Debug, Clone)]
pub struct LocalEntity {
    id: ConceptId,
    thing_type: Box<LocalConcept>,
    inferred: bool,
}
impl LocalEntity {
    pub fn thing_type(&self) -> &LocalConcept {
        &self.thing_type
    }
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }
}

#[derive(Debug, Clone)]
pub struct LocalRelation {
    id: ConceptId,
    thing_type: Box<LocalConcept>,
    inferred: bool,
}
impl LocalRelation {
    pub fn thing_type(&self) -> &LocalConcept {
        &self.thing_type
    }
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }
}

#[derive(Debug, Clone)]
pub struct LocalAttribute {
    id: ConceptId,
    thing_type: Box<LocalConcept>,
    inferred: bool,
    data_type: DataType,
    value: Value,
}
impl LocalAttribute {
    pub fn thing_type(&self) -> &LocalConcept {
        &self.thing_type
    }
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Debug, Clone)]
pub struct LocalEntityType {
    id: ConceptId,
    label: Label,
    is_abstract: bool,
}
impl LocalEntityType {
    pub fn label(&self) -> &Label {
        &self.label
    }
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
}

#[derive(Debug, Clone)]
pub struct LocalRelationType {
    id: ConceptId,
    label: Label,
    is_abstract: bool,
}
impl LocalRelationType {
    pub fn label(&self) -> &Label {
        &self.label
    }
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
}

#[derive(Debug, Clone)]
pub struct LocalAttributeType {
    id: ConceptId,
    label: Label,
    is_abstract: bool,
    // absent on non-instantiable attribute types
    data_type: Option<DataType>,
    regex: Option<String>,
}
impl LocalAttributeType {
    pub fn label(&self) -> &Label {
        &self.label
    }
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }
    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }
    pub fn regex(&self) -> Option<&str> {
        self.regex.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct LocalRole {
    id: ConceptId,
    label: Label,
}
impl LocalRole {
    pub fn label(&self) -> &Label {
        &self.label
    }
}

#[derive(Debug, Clone)]
pub struct LocalRule {
    id: ConceptId,
    label: Label,
    // both absent on the meta rule
    when: Option<String>,
    then: Option<String>,
}
impl LocalRule {
    pub fn label(&self) -> &Label {
        &self.label
    }
    pub fn when(&self) -> Option<&str> {
        self.when.as_deref()
    }
    pub fn then(&self) -> Option<&str> {
        self.then.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct LocalMetaType {
    id: ConceptId,
    label: Label,
}
impl LocalMetaType {
    pub fn label(&self) -> &Label {
        &self.label
    }
}

// ------------- LocalConcept -------------

/// The tagged union over the nine local snapshot variants.
#[derive(Debug, Clone)]
pub enum LocalConcept {
    Entity(LocalEntity),
    Relation(LocalRelation),
    Attribute(LocalAttribute),
    EntityType(LocalEntityType),
    RelationType(LocalRelationType),
    AttributeType(LocalAttributeType),
    Role(LocalRole),
    Rule(LocalRule),
    MetaType(LocalMetaType),
}

impl LocalConcept {
    /// The Local factory: decode a wire message into the matching snapshot,
    /// eagerly caching every field the message carries for its kind.
    pub fn of(message: ConceptMessage) -> Result<LocalConcept> {
        let kind = ConceptKind::from_code(message.kind)?;
        let id = message.id;
        let concept = match kind {
            ConceptKind::Entity => LocalConcept::Entity(LocalEntity {
                id,
                thing_type: Box::new(LocalConcept::of(*require(
                    message.type_of,
                    kind,
                    "type_of",
                )?)?),
                inferred: require(message.is_inferred, kind, "is_inferred")?,
            }),
            ConceptKind::Relation => LocalConcept::Relation(LocalRelation {
                id,
                thing_type: Box::new(LocalConcept::of(*require(
                    message.type_of,
                    kind,
                    "type_of",
                )?)?),
                inferred: require(message.is_inferred, kind, "is_inferred")?,
            }),
            ConceptKind::Attribute => {
                let data_type =
                    DataType::from_uid(require(message.data_type, kind, "data_type")?)?;
                let value = Value::decode(&require(message.value, kind, "value")?)?;
                if value.data_type() != data_type {
                    return Err(GraphlingError::ProtocolViolation(format!(
                        "attribute {id} declares {data_type} but carries a {} value",
                        value.data_type()
                    )));
                }
                LocalConcept::Attribute(LocalAttribute {
                    id,
                    thing_type: Box::new(LocalConcept::of(*require(
                        message.type_of,
                        kind,
                        "type_of",
                    )?)?),
                    inferred: require(message.is_inferred, kind, "is_inferred")?,
                    data_type,
                    value,
                })
            }
            ConceptKind::EntityType => LocalConcept::EntityType(LocalEntityType {
                id,
                label: Label::of(require(message.label, kind, "label")?),
                is_abstract: require(message.is_abstract, kind, "is_abstract")?,
            }),
            ConceptKind::RelationType => LocalConcept::RelationType(LocalRelationType {
                id,
                label: Label::of(require(message.label, kind, "label")?),
                is_abstract: require(message.is_abstract, kind, "is_abstract")?,
            }),
            ConceptKind::AttributeType => LocalConcept::AttributeType(LocalAttributeType {
                id,
                label: Label::of(require(message.label, kind, "label")?),
                is_abstract: require(message.is_abstract, kind, "is_abstract")?,
                data_type: message.data_type.map(DataType::from_uid).transpose()?,
                regex: message.regex,
            }),
            ConceptKind::Role => LocalConcept::Role(LocalRole {
                id,
                label: Label::of(require(message.label, kind, "label")?),
            }),
            ConceptKind::Rule => LocalConcept::Rule(LocalRule {
                id,
                label: Label::of(require(message.label, kind, "label")?),
                when: message.when,
                then: message.then,
            }),
            ConceptKind::MetaType => LocalConcept::MetaType(LocalMetaType {
                id,
                label: Label::of(require(message.label, kind, "label")?),
            }),
        };
        Ok(concept)
    }

    fn invalid_casting(&self, requested: &'static str) -> GraphlingError {
        GraphlingError::InvalidCasting {
            id: self.id().clone(),
            actual: self.kind(),
            requested,
        }
    }

    // ------------- Narrowing -------------
    // Exactly one succeeds per kind; the rest report InvalidCasting.

    pub fn as_entity(&self) -> Result<&LocalEntity> {
        match self {
            LocalConcept::Entity(e) => Ok(e),
            other => Err(other.invalid_casting("Entity")),
        }
    }
    pub fn as_relation(&self) -> Result<&LocalRelation> {
        match self {
            LocalConcept::Relation(r) => Ok(r),
            other => Err(other.invalid_casting("Relation")),
        }
    }
    pub fn as_attribute(&self) -> Result<&LocalAttribute> {
        match self {
            LocalConcept::Attribute(a) => Ok(a),
            other => Err(other.invalid_casting("Attribute")),
        }
    }
    pub fn as_entity_type(&self) -> Result<&LocalEntityType> {
        match self {
            LocalConcept::EntityType(t) => Ok(t),
            other => Err(other.invalid_casting("EntityType")),
        }
    }
    pub fn as_relation_type(&self) -> Result<&LocalRelationType> {
        match self {
            LocalConcept::RelationType(t) => Ok(t),
            other => Err(other.invalid_casting("RelationType")),
        }
    }
    pub fn as_attribute_type(&self) -> Result<&LocalAttributeType> {
        match self {
            LocalConcept::AttributeType(t) => Ok(t),
            other => Err(other.invalid_casting("AttributeType")),
        }
    }
    pub fn as_role(&self) -> Result<&LocalRole> {
        match self {
            LocalConcept::Role(r) => Ok(r),
            other => Err(other.invalid_casting("Role")),
        }
    }
    pub fn as_rule(&self) -> Result<&LocalRule> {
        match self {
            LocalConcept::Rule(r) => Ok(r),
            other => Err(other.invalid_casting("Rule")),
        }
    }
    pub fn as_meta_type(&self) -> Result<&LocalMetaType> {
        match self {
            LocalConcept::MetaType(m) => Ok(m),
            other => Err(other.invalid_casting("MetaType")),
        }
    }

    // ------------- Predicates -------------
    // Mirror the narrowing set and never fail.

    pub fn is_entity(&self) -> bool {
        self.kind() == ConceptKind::Entity
    }
    pub fn is_relation(&self) -> bool {
        self.kind() == ConceptKind::Relation
    }
    pub fn is_attribute(&self) -> bool {
        self.kind() == ConceptKind::Attribute
    }
    pub fn is_entity_type(&self) -> bool {
        self.kind() == ConceptKind::EntityType
    }
    pub fn is_relation_type(&self) -> bool {
        self.kind() == ConceptKind::RelationType
    }
    pub fn is_attribute_type(&self) -> bool {
        self.kind() == ConceptKind::AttributeType
    }
    pub fn is_role(&self) -> bool {
        self.kind() == ConceptKind::Role
    }
    pub fn is_rule(&self) -> bool {
        self.kind() == ConceptKind::Rule
    }
    pub fn is_meta_type(&self) -> bool {
        self.kind() == ConceptKind::MetaType
    }
    pub fn is_thing(&self) -> bool {
        self.kind().is_thing()
    }
    pub fn is_type(&self) -> bool {
        self.kind().is_type()
    }
    pub fn is_schema_concept(&self) -> bool {
        self.kind().is_schema_concept()
    }

    /// The label, for any schema concept variant.
    pub fn label(&self) -> Option<&Label> {
        match self {
            LocalConcept::EntityType(t) => Some(&t.label),
            LocalConcept::RelationType(t) => Some(&t.label),
            LocalConcept::AttributeType(t) => Some(&t.label),
            LocalConcept::Role(r) => Some(&r.label),
            LocalConcept::Rule(r) => Some(&r.label),
            LocalConcept::MetaType(m) => Some(&m.label),
            _ => None,
        }
    }
}

impl Concept for LocalConcept {
    fn id(&self) -> &ConceptId {
        match self {
            LocalConcept::Entity(e) => &e.id,
            LocalConcept::Relation(r) => &r.id,
            LocalConcept::Attribute(a) => &a.id,
            LocalConcept::EntityType(t) => &t.id,
            LocalConcept::RelationType(t) => &t.id,
            LocalConcept::AttributeType(t) => &t.id,
            LocalConcept::Role(r) => &r.id,
            LocalConcept::Rule(r) => &r.id,
            LocalConcept::MetaType(m) => &m.id,
        }
    }

    fn kind(&self) -> ConceptKind {
        match self {
            LocalConcept::Entity(_) => ConceptKind::Entity,
            LocalConcept::Relation(_) => ConceptKind::Relation,
            LocalConcept::Attribute(_) => ConceptKind::Attribute,
            LocalConcept::EntityType(_) => ConceptKind::EntityType,
            LocalConcept::RelationType(_) => ConceptKind::RelationType,
            LocalConcept::AttributeType(_) => ConceptKind::AttributeType,
            LocalConcept::Role(_) => ConceptKind::Role,
            LocalConcept::Rule(_) => ConceptKind::Rule,
            LocalConcept::MetaType(_) => ConceptKind::MetaType,
        }
    }
}

// identity comparison: (id, kind) only, cached fields do not participate
impl PartialEq for LocalConcept {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.kind() == other.kind()
    }
}
impl Eq for LocalConcept {}
impl Hash for LocalConcept {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
        self.kind().hash(state);
    }
}
