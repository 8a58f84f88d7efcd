//! Wire messages exchanged with the server, and the rules for reading typed
//! fields out of them.
//!
//! The byte-level encoding is the transport's concern; these types are the
//! schema it carries, so they all derive `Serialize`/`Deserialize`. Concept
//! kinds and data types travel as raw discriminant codes. Decoding an
//! unrecognized code, or finding a response case that does not match the
//! issued operation, indicates a client/server version mismatch and fails
//! with a fatal [`GraphlingError::ProtocolViolation`].

use serde::{Deserialize, Serialize};

use crate::concept::ConceptId;
use crate::error::{GraphlingError, Result};

// ------------- WireValue -------------

/// A scalar attribute value as it travels on the wire. Datetimes are epoch
/// milliseconds; see [`crate::datatype::Value`] for the decoded form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    DateTime(i64),
}

// ------------- ConceptMessage -------------

/// A concept as carried by responses: `(id, kind code)` plus the kind-specific
/// fields that a Local snapshot decodes eagerly. A Remote handle reads only
/// the identity and ignores the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptMessage {
    pub id: ConceptId,
    /// Raw kind discriminant; see [`crate::concept::ConceptKind::from_code`].
    pub kind: u8,
    pub label: Option<String>,
    pub is_abstract: Option<bool>,
    /// Raw data type uid; see [`crate::datatype::DataType::from_uid`].
    pub data_type: Option<u8>,
    pub regex: Option<String>,
    pub value: Option<WireValue>,
    pub is_inferred: Option<bool>,
    pub type_of: Option<Box<ConceptMessage>>,
    pub when: Option<String>,
    pub then: Option<String>,
}

impl ConceptMessage {
    /// A bare identity message, the minimum a Remote factory needs.
    pub fn new(id: ConceptId, kind: crate::concept::ConceptKind) -> Self {
        Self {
            id,
            kind: kind.code(),
            label: None,
            is_abstract: None,
            data_type: None,
            regex: None,
            value: None,
            is_inferred: None,
            type_of: None,
            when: None,
            then: None,
        }
    }
}

// ------------- Requests -------------

/// A unary or stream-opening operation message: the concept the operation is
/// invoked on, plus the operation discriminant and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRequest {
    pub concept_id: ConceptId,
    pub body: MethodBody,
}

/// One variant per concept operation. Variants prefixed by the capability
/// that owns them. The streaming operations open a cursor; everything else is
/// unary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodBody {
    // concept
    Delete,
    IsDeleted,
    // schema concept
    SchemaLabel,
    SchemaSetLabel(String),
    SchemaSup,
    SchemaSetSup(ConceptId),
    SchemaSups,
    SchemaSubs,
    // type
    TypeIsAbstract,
    TypeSetAbstract(bool),
    TypePlaying,
    TypePlay(ConceptId),
    TypeUnplay(ConceptId),
    TypeAttributes,
    TypeKeys,
    TypeHas { attribute_type: ConceptId, key: bool },
    TypeUnhas(ConceptId),
    TypeUnkey(ConceptId),
    TypeInstances,
    // entity type
    EntityTypeCreate,
    // relation type
    RelationTypeCreate,
    RelationTypeRoles,
    RelationTypeRelate(ConceptId),
    RelationTypeUnrelate(ConceptId),
    // attribute type
    AttributeTypeCreate(WireValue),
    AttributeTypeAttribute(WireValue),
    AttributeTypeDataType,
    AttributeTypeRegex,
    AttributeTypeSetRegex(Option<String>),
    // thing
    ThingType,
    ThingIsInferred,
    ThingAttributes(Vec<ConceptId>),
    ThingKeys(Vec<ConceptId>),
    ThingRelations(Vec<ConceptId>),
    ThingRoles,
    ThingHas(ConceptId),
    ThingUnhas(ConceptId),
    // relation
    RelationRolePlayersMap,
    RelationRolePlayers(Vec<ConceptId>),
    RelationAssign { role: ConceptId, player: ConceptId },
    RelationUnassign { role: ConceptId, player: ConceptId },
    // attribute
    AttributeValue,
    AttributeOwners,
    // role
    RoleRelations,
    RolePlayers,
    // rule
    RuleWhen,
    RuleThen,
}

// ------------- Responses -------------

/// The fixed set of typed unary results. Absence is always an explicit
/// `Optional*` case, never a sentinel value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodResponse {
    Unit,
    Bool(bool),
    Label(String),
    Concept(ConceptMessage),
    OptionalConcept(Option<ConceptMessage>),
    Value(WireValue),
    OptionalDataType(Option<u8>),
    OptionalRegex(Option<String>),
    OptionalPattern(Option<String>),
    Iterator(IteratorId),
}

impl MethodResponse {
    fn case(&self) -> &'static str {
        match self {
            MethodResponse::Unit => "Unit",
            MethodResponse::Bool(_) => "Bool",
            MethodResponse::Label(_) => "Label",
            MethodResponse::Concept(_) => "Concept",
            MethodResponse::OptionalConcept(_) => "OptionalConcept",
            MethodResponse::Value(_) => "Value",
            MethodResponse::OptionalDataType(_) => "OptionalDataType",
            MethodResponse::OptionalRegex(_) => "OptionalRegex",
            MethodResponse::OptionalPattern(_) => "OptionalPattern",
            MethodResponse::Iterator(_) => "Iterator",
        }
    }

    fn mismatch(&self, expected: &'static str) -> GraphlingError {
        GraphlingError::ProtocolViolation(format!(
            "expected {expected} response, received {}",
            self.case()
        ))
    }

    pub fn into_unit(self) -> Result<()> {
        match self {
            MethodResponse::Unit => Ok(()),
            other => Err(other.mismatch("Unit")),
        }
    }
    pub fn into_bool(self) -> Result<bool> {
        match self {
            MethodResponse::Bool(b) => Ok(b),
            other => Err(other.mismatch("Bool")),
        }
    }
    pub fn into_label(self) -> Result<String> {
        match self {
            MethodResponse::Label(l) => Ok(l),
            other => Err(other.mismatch("Label")),
        }
    }
    pub fn into_concept(self) -> Result<ConceptMessage> {
        match self {
            MethodResponse::Concept(c) => Ok(c),
            other => Err(other.mismatch("Concept")),
        }
    }
    pub fn into_optional_concept(self) -> Result<Option<ConceptMessage>> {
        match self {
            MethodResponse::OptionalConcept(c) => Ok(c),
            other => Err(other.mismatch("OptionalConcept")),
        }
    }
    pub fn into_value(self) -> Result<WireValue> {
        match self {
            MethodResponse::Value(v) => Ok(v),
            other => Err(other.mismatch("Value")),
        }
    }
    pub fn into_optional_data_type(self) -> Result<Option<u8>> {
        match self {
            MethodResponse::OptionalDataType(d) => Ok(d),
            other => Err(other.mismatch("OptionalDataType")),
        }
    }
    pub fn into_optional_regex(self) -> Result<Option<String>> {
        match self {
            MethodResponse::OptionalRegex(r) => Ok(r),
            other => Err(other.mismatch("OptionalRegex")),
        }
    }
    pub fn into_optional_pattern(self) -> Result<Option<String>> {
        match self {
            MethodResponse::OptionalPattern(p) => Ok(p),
            other => Err(other.mismatch("OptionalPattern")),
        }
    }
    pub fn into_iterator(self) -> Result<IteratorId> {
        match self {
            MethodResponse::Iterator(id) => Ok(id),
            other => Err(other.mismatch("Iterator")),
        }
    }
}

// ------------- Streaming -------------

/// Server-issued cursor handle for paged streaming results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IteratorId(pub u64);

/// One page of a streaming result. `done` marks the terminal page; pulling
/// past it is undefined at the protocol level and never attempted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<StreamItem>,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamItem {
    Concept(ConceptMessage),
    RolePlayer {
        role: ConceptMessage,
        player: ConceptMessage,
    },
}
