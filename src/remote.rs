//! Remote concepts: live handles bound to an open transaction.
//!
//! A remote concept retains only `(id, kind)` plus a non-owning clone of its
//! [`Transaction`]; nothing else is cached, so every accessor issues a fresh
//! call and reflects current server state. Capabilities are expressed as
//! traits over a shared dispatch core rather than an inheritance chain:
//! [`SchemaConceptOps`] for anything with a label and a supertype,
//! [`TypeOps`] for instantiable schema concepts, [`ThingOps`] for data
//! instances. Kind-specific operations live on the concrete handles.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use crate::codec::{ConceptMessage, MethodBody, MethodRequest, MethodResponse, StreamItem};
use crate::concept::{Concept, ConceptId, ConceptIdHasher, ConceptKind, Label};
use crate::datatype::{DataType, Value};
use crate::error::{GraphlingError, Result};
use crate::transaction::{ConceptStream, Transaction};

// ------------- RemoteConcept -------------

/// A live handle to one server-side concept.
#[derive(Clone)]
pub struct RemoteConcept {
    id: ConceptId,
    kind: ConceptKind,
    tx: Transaction,
}

impl RemoteConcept {
    /// The Remote factory: read `(id, kind)` from a wire message and bind the
    /// handle to the given transaction. No field beyond identity is kept.
    pub fn of(message: &ConceptMessage, tx: &Transaction) -> Result<RemoteConcept> {
        Ok(RemoteConcept {
            id: message.id.clone(),
            kind: ConceptKind::from_code(message.kind)?,
            tx: tx.clone(),
        })
    }

    pub(crate) fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub(crate) fn call(&self, body: MethodBody) -> Result<MethodResponse> {
        self.tx.call(MethodRequest {
            concept_id: self.id.clone(),
            body,
        })
    }

    pub(crate) fn stream_body(&self, body: MethodBody) -> Result<ConceptStream> {
        self.tx.stream(MethodRequest {
            concept_id: self.id.clone(),
            body,
        })
    }

    pub(crate) fn iter(&self, body: MethodBody) -> Result<ConceptIter> {
        Ok(ConceptIter {
            stream: self.stream_body(body)?,
            tx: self.tx.clone(),
        })
    }

    /// Delete the concept on the server. The server remains the source of
    /// truth afterwards: only [`RemoteConcept::is_deleted`] is guaranteed to
    /// keep answering.
    pub fn delete(&self) -> Result<()> {
        self.call(MethodBody::Delete)?.into_unit()
    }

    /// Always re-queried, never cached.
    pub fn is_deleted(&self) -> Result<bool> {
        self.call(MethodBody::IsDeleted)?.into_bool()
    }

    fn narrow(&self, requested: &'static str, matches: bool) -> Result<RemoteConcept> {
        if matches {
            Ok(self.clone())
        } else {
            Err(GraphlingError::InvalidCasting {
                id: self.id.clone(),
                actual: self.kind,
                requested,
            })
        }
    }

    // ------------- Narrowing -------------
    // Exactly one kind narrowing succeeds per concept; narrowing never
    // crosses the binding axis.

    pub fn as_entity(&self) -> Result<RemoteEntity> {
        Ok(RemoteEntity(
            self.narrow("Entity", self.kind == ConceptKind::Entity)?,
        ))
    }
    pub fn as_relation(&self) -> Result<RemoteRelation> {
        Ok(RemoteRelation(
            self.narrow("Relation", self.kind == ConceptKind::Relation)?,
        ))
    }
    pub fn as_attribute(&self) -> Result<RemoteAttribute> {
        Ok(RemoteAttribute(
            self.narrow("Attribute", self.kind == ConceptKind::Attribute)?,
        ))
    }
    pub fn as_entity_type(&self) -> Result<RemoteEntityType> {
        Ok(RemoteEntityType(
            self.narrow("EntityType", self.kind == ConceptKind::EntityType)?,
        ))
    }
    pub fn as_relation_type(&self) -> Result<RemoteRelationType> {
        Ok(RemoteRelationType(
            self.narrow("RelationType", self.kind == ConceptKind::RelationType)?,
        ))
    }
    pub fn as_attribute_type(&self) -> Result<RemoteAttributeType> {
        Ok(RemoteAttributeType(
            self.narrow("AttributeType", self.kind == ConceptKind::AttributeType)?,
        ))
    }
    pub fn as_role(&self) -> Result<RemoteRole> {
        Ok(RemoteRole(
            self.narrow("Role", self.kind == ConceptKind::Role)?,
        ))
    }
    pub fn as_rule(&self) -> Result<RemoteRule> {
        Ok(RemoteRule(
            self.narrow("Rule", self.kind == ConceptKind::Rule)?,
        ))
    }
    pub fn as_meta_type(&self) -> Result<RemoteMetaType> {
        Ok(RemoteMetaType(
            self.narrow("MetaType", self.kind == ConceptKind::MetaType)?,
        ))
    }

    // capability-group narrowing
    pub fn as_thing(&self) -> Result<RemoteThing> {
        Ok(RemoteThing(self.narrow("Thing", self.kind.is_thing())?))
    }
    pub fn as_type(&self) -> Result<RemoteType> {
        Ok(RemoteType(self.narrow("Type", self.kind.is_type())?))
    }
    pub fn as_schema_concept(&self) -> Result<RemoteSchemaConcept> {
        Ok(RemoteSchemaConcept(
            self.narrow("SchemaConcept", self.kind.is_schema_concept())?,
        ))
    }

    // ------------- Predicates -------------

    pub fn is_entity(&self) -> bool {
        self.kind == ConceptKind::Entity
    }
    pub fn is_relation(&self) -> bool {
        self.kind == ConceptKind::Relation
    }
    pub fn is_attribute(&self) -> bool {
        self.kind == ConceptKind::Attribute
    }
    pub fn is_entity_type(&self) -> bool {
        self.kind == ConceptKind::EntityType
    }
    pub fn is_relation_type(&self) -> bool {
        self.kind == ConceptKind::RelationType
    }
    pub fn is_attribute_type(&self) -> bool {
        self.kind == ConceptKind::AttributeType
    }
    pub fn is_role(&self) -> bool {
        self.kind == ConceptKind::Role
    }
    pub fn is_rule(&self) -> bool {
        self.kind == ConceptKind::Rule
    }
    pub fn is_meta_type(&self) -> bool {
        self.kind == ConceptKind::MetaType
    }
    pub fn is_thing(&self) -> bool {
        self.kind.is_thing()
    }
    pub fn is_type(&self) -> bool {
        self.kind.is_type()
    }
    pub fn is_schema_concept(&self) -> bool {
        self.kind.is_schema_concept()
    }
}

impl Concept for RemoteConcept {
    fn id(&self) -> &ConceptId {
        &self.id
    }
    fn kind(&self) -> ConceptKind {
        self.kind
    }
}

// identity comparison: the transaction reference does not participate
impl PartialEq for RemoteConcept {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}
impl Eq for RemoteConcept {}
impl Hash for RemoteConcept {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.kind.hash(state);
    }
}
impl fmt::Debug for RemoteConcept {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RemoteConcept({} {})", self.kind, self.id)
    }
}

// ------------- Typed handles -------------

macro_rules! remote_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(RemoteConcept);

        impl Deref for $name {
            type Target = RemoteConcept;
            fn deref(&self) -> &RemoteConcept {
                &self.0
            }
        }
        impl From<$name> for RemoteConcept {
            fn from(concept: $name) -> RemoteConcept {
                concept.0
            }
        }
        impl Concept for $name {
            fn id(&self) -> &ConceptId {
                &self.0.id
            }
            fn kind(&self) -> ConceptKind {
                self.0.kind
            }
        }
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0.id)
            }
        }
    };
}

remote_handle!(
    /// A data instance of an entity type.
    RemoteEntity
);
remote_handle!(
    /// A data instance associating role players.
    RemoteRelation
);
remote_handle!(
    /// A data instance carrying a typed value.
    RemoteAttribute
);
remote_handle!(RemoteEntityType);
remote_handle!(RemoteRelationType);
remote_handle!(RemoteAttributeType);
remote_handle!(RemoteRole);
remote_handle!(RemoteRule);
remote_handle!(
    /// One of the non-instantiable root types.
    RemoteMetaType
);
remote_handle!(
    /// Capability-group handle over any data instance.
    RemoteThing
);
remote_handle!(
    /// Capability-group handle over any instantiable schema concept.
    RemoteType
);
remote_handle!(
    /// Capability-group handle over any schema concept.
    RemoteSchemaConcept
);

// ------------- Capability traits -------------

/// Operations shared by every schema concept: labeling and the
/// supertype/subtype hierarchy.
pub trait SchemaConceptOps: Deref<Target = RemoteConcept> {
    fn label(&self) -> Result<Label> {
        Ok(Label::of(self.call(MethodBody::SchemaLabel)?.into_label()?))
    }

    fn set_label(&self, label: &Label) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::SchemaSetLabel(label.as_str().to_owned()))?
            .into_unit()?;
        Ok(self)
    }

    /// The direct supertype. Absent only on the meta roots.
    fn sup(&self) -> Result<Option<RemoteSchemaConcept>> {
        match self.call(MethodBody::SchemaSup)?.into_optional_concept()? {
            Some(message) => Ok(Some(
                RemoteConcept::of(&message, self.tx())?.as_schema_concept()?,
            )),
            None => Ok(None),
        }
    }

    fn set_sup(&self, sup: &RemoteConcept) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::SchemaSetSup(sup.id().clone()))?
            .into_unit()?;
        Ok(self)
    }

    /// Reflexive-transitive closure of supertypes, streamed.
    fn sups(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::SchemaSups)
    }

    /// Reflexive-transitive closure of subtypes, streamed.
    fn subs(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::SchemaSubs)
    }
}

/// Operations on instantiable schema concepts.
pub trait TypeOps: SchemaConceptOps {
    fn is_abstract(&self) -> Result<bool> {
        self.call(MethodBody::TypeIsAbstract)?.into_bool()
    }

    /// Abstract types reject instantiation (enforced server-side).
    fn set_abstract(&self, is_abstract: bool) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::TypeSetAbstract(is_abstract))?
            .into_unit()?;
        Ok(self)
    }

    /// The roles instances of this type may play.
    fn playing(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::TypePlaying)
    }

    fn play(&self, role: &RemoteRole) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::TypePlay(role.id().clone()))?
            .into_unit()?;
        Ok(self)
    }

    fn unplay(&self, role: &RemoteRole) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::TypeUnplay(role.id().clone()))?
            .into_unit()?;
        Ok(self)
    }

    /// The attribute types instances of this type may own.
    fn attributes(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::TypeAttributes)
    }

    /// The attribute types owned as uniqueness-constrained keys.
    fn keys(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::TypeKeys)
    }

    fn has(&self, attribute_type: &RemoteAttributeType) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::TypeHas {
            attribute_type: attribute_type.id().clone(),
            key: false,
        })?
        .into_unit()?;
        Ok(self)
    }

    fn key(&self, attribute_type: &RemoteAttributeType) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::TypeHas {
            attribute_type: attribute_type.id().clone(),
            key: true,
        })?
        .into_unit()?;
        Ok(self)
    }

    fn unhas(&self, attribute_type: &RemoteAttributeType) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::TypeUnhas(attribute_type.id().clone()))?
            .into_unit()?;
        Ok(self)
    }

    fn unkey(&self, attribute_type: &RemoteAttributeType) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::TypeUnkey(attribute_type.id().clone()))?
            .into_unit()?;
        Ok(self)
    }

    /// All direct and indirect instances, streamed.
    fn instances(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::TypeInstances)
    }
}

/// Operations on data instances.
pub trait ThingOps: Deref<Target = RemoteConcept> {
    fn thing_type(&self) -> Result<RemoteType> {
        RemoteConcept::of(&self.call(MethodBody::ThingType)?.into_concept()?, self.tx())?
            .as_type()
    }

    /// Whether this instance was materialized by rule evaluation rather than
    /// explicitly inserted.
    fn is_inferred(&self) -> Result<bool> {
        self.call(MethodBody::ThingIsInferred)?.into_bool()
    }

    /// Owned attributes, optionally filtered by attribute type.
    fn attributes(&self, filter: &[&RemoteAttributeType]) -> Result<ConceptIter> {
        self.iter(MethodBody::ThingAttributes(ids(filter)))
    }

    /// Owned key attributes, optionally filtered by attribute type.
    fn keys(&self, filter: &[&RemoteAttributeType]) -> Result<ConceptIter> {
        self.iter(MethodBody::ThingKeys(ids(filter)))
    }

    /// Relations this instance plays a role in, optionally filtered by role.
    fn relations(&self, filter: &[&RemoteRole]) -> Result<ConceptIter> {
        self.iter(MethodBody::ThingRelations(ids(filter)))
    }

    /// The roles this instance currently plays.
    fn roles(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::ThingRoles)
    }

    fn has(&self, attribute: &RemoteAttribute) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::ThingHas(attribute.id().clone()))?
            .into_unit()?;
        Ok(self)
    }

    fn unhas(&self, attribute: &RemoteAttribute) -> Result<&Self>
    where
        Self: Sized,
    {
        self.call(MethodBody::ThingUnhas(attribute.id().clone()))?
            .into_unit()?;
        Ok(self)
    }
}

fn ids<C: Concept>(concepts: &[&C]) -> Vec<ConceptId> {
    concepts.iter().map(|c| c.id().clone()).collect()
}

impl SchemaConceptOps for RemoteEntityType {}
impl SchemaConceptOps for RemoteRelationType {}
impl SchemaConceptOps for RemoteAttributeType {}
impl SchemaConceptOps for RemoteRole {}
impl SchemaConceptOps for RemoteRule {}
impl SchemaConceptOps for RemoteMetaType {}
impl SchemaConceptOps for RemoteType {}
impl SchemaConceptOps for RemoteSchemaConcept {}

impl TypeOps for RemoteEntityType {}
impl TypeOps for RemoteRelationType {}
impl TypeOps for RemoteAttributeType {}
impl TypeOps for RemoteRole {}
impl TypeOps for RemoteMetaType {}
impl TypeOps for RemoteType {}

impl ThingOps for RemoteEntity {}
impl ThingOps for RemoteRelation {}
impl ThingOps for RemoteAttribute {}
impl ThingOps for RemoteThing {}

// ------------- Kind-specific operations -------------

impl RemoteEntityType {
    /// Create a new entity instance of this type.
    pub fn create(&self) -> Result<RemoteEntity> {
        RemoteConcept::of(
            &self.call(MethodBody::EntityTypeCreate)?.into_concept()?,
            self.tx(),
        )?
        .as_entity()
    }
}

impl RemoteRelationType {
    /// Create a new relation instance of this type.
    pub fn create(&self) -> Result<RemoteRelation> {
        RemoteConcept::of(
            &self.call(MethodBody::RelationTypeCreate)?.into_concept()?,
            self.tx(),
        )?
        .as_relation()
    }

    /// The roles this relation type declares via `relates`.
    pub fn roles(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::RelationTypeRoles)
    }

    pub fn relate(&self, role: &RemoteRole) -> Result<&Self> {
        self.call(MethodBody::RelationTypeRelate(role.id().clone()))?
            .into_unit()?;
        Ok(self)
    }

    pub fn unrelate(&self, role: &RemoteRole) -> Result<&Self> {
        self.call(MethodBody::RelationTypeUnrelate(role.id().clone()))?
            .into_unit()?;
        Ok(self)
    }
}

impl RemoteAttributeType {
    /// Create (or fetch, if the server deduplicates by value) the attribute
    /// instance holding `value`. Whichever instance the server returns is
    /// accepted.
    pub fn create(&self, value: Value) -> Result<RemoteAttribute> {
        RemoteConcept::of(
            &self
                .call(MethodBody::AttributeTypeCreate(value.encode()))?
                .into_concept()?,
            self.tx(),
        )?
        .as_attribute()
    }

    /// Look up the attribute instance holding `value`, if any.
    pub fn attribute(&self, value: Value) -> Result<Option<RemoteAttribute>> {
        match self
            .call(MethodBody::AttributeTypeAttribute(value.encode()))?
            .into_optional_concept()?
        {
            Some(message) => Ok(Some(RemoteConcept::of(&message, self.tx())?.as_attribute()?)),
            None => Ok(None),
        }
    }

    /// The declared value kind. Absent on non-instantiable attribute types.
    pub fn data_type(&self) -> Result<Option<DataType>> {
        self.call(MethodBody::AttributeTypeDataType)?
            .into_optional_data_type()?
            .map(DataType::from_uid)
            .transpose()
    }

    /// The regex constraint, if one is set. Only meaningful on string-kind
    /// attribute types; validation and enforcement are server-side.
    pub fn regex(&self) -> Result<Option<String>> {
        Ok(self
            .call(MethodBody::AttributeTypeRegex)?
            .into_optional_regex()?
            .filter(|r| !r.is_empty()))
    }

    /// Set or clear the regex constraint. An empty string clears, same as
    /// `None`.
    pub fn set_regex(&self, regex: Option<&str>) -> Result<&Self> {
        let regex = regex.filter(|r| !r.is_empty()).map(str::to_owned);
        self.call(MethodBody::AttributeTypeSetRegex(regex))?
            .into_unit()?;
        Ok(self)
    }
}

impl RemoteRelation {
    /// All role players grouped by role.
    pub fn role_players_map(
        &self,
    ) -> Result<HashMap<RemoteRole, HashSet<RemoteThing, ConceptIdHasher>, ConceptIdHasher>> {
        let stream = self.stream_body(MethodBody::RelationRolePlayersMap)?;
        let mut map: HashMap<RemoteRole, HashSet<RemoteThing, ConceptIdHasher>, ConceptIdHasher> =
            HashMap::default();
        for item in stream {
            match item? {
                StreamItem::RolePlayer { role, player } => {
                    let role = RemoteConcept::of(&role, self.tx())?.as_role()?;
                    let player = RemoteConcept::of(&player, self.tx())?.as_thing()?;
                    map.entry(role).or_default().insert(player);
                }
                StreamItem::Concept(message) => {
                    return Err(GraphlingError::ProtocolViolation(format!(
                        "expected a role player item, received concept {}",
                        message.id
                    )));
                }
            }
        }
        Ok(map)
    }

    /// The things playing a role in this relation, optionally filtered by
    /// role. Each distinct player is produced once.
    pub fn role_players(&self, filter: &[&RemoteRole]) -> Result<ConceptIter> {
        self.iter(MethodBody::RelationRolePlayers(ids(filter)))
    }

    pub fn assign(&self, role: &RemoteRole, player: &RemoteThing) -> Result<&Self> {
        self.call(MethodBody::RelationAssign {
            role: role.id().clone(),
            player: player.id().clone(),
        })?
        .into_unit()?;
        Ok(self)
    }

    pub fn unassign(&self, role: &RemoteRole, player: &RemoteThing) -> Result<&Self> {
        self.call(MethodBody::RelationUnassign {
            role: role.id().clone(),
            player: player.id().clone(),
        })?
        .into_unit()?;
        Ok(self)
    }
}

impl RemoteAttribute {
    /// The decoded value. Round-trips exactly per value kind.
    pub fn value(&self) -> Result<Value> {
        Value::decode(&self.call(MethodBody::AttributeValue)?.into_value()?)
    }

    /// The value kind of this instance; always present on attributes.
    pub fn data_type(&self) -> Result<DataType> {
        match self
            .call(MethodBody::AttributeTypeDataType)?
            .into_optional_data_type()?
        {
            Some(uid) => DataType::from_uid(uid),
            None => Err(GraphlingError::ProtocolViolation(format!(
                "attribute {} reported no data type",
                self.id()
            ))),
        }
    }

    /// The things owning this attribute, streamed.
    pub fn owners(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::AttributeOwners)
    }
}

impl RemoteRole {
    /// The relation types declaring this role via `relates`.
    pub fn relations(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::RoleRelations)
    }

    /// The types whose instances are permitted to play this role.
    pub fn players(&self) -> Result<ConceptIter> {
        self.iter(MethodBody::RolePlayers)
    }
}

impl RemoteRule {
    /// The `when` pattern; an opaque query-language fragment. Absent on the
    /// meta rule.
    pub fn when(&self) -> Result<Option<String>> {
        self.call(MethodBody::RuleWhen)?.into_optional_pattern()
    }

    /// The `then` pattern. Absent on the meta rule.
    pub fn then(&self) -> Result<Option<String>> {
        self.call(MethodBody::RuleThen)?.into_optional_pattern()
    }
}

impl RemoteMetaType {
    /// The meta attribute type is not instantiable and reports no value
    /// kind: the response carries an explicit absent case.
    pub fn data_type(&self) -> Result<Option<DataType>> {
        self.call(MethodBody::AttributeTypeDataType)?
            .into_optional_data_type()?
            .map(DataType::from_uid)
            .transpose()
    }
}

// ------------- ConceptIter -------------

/// Lazy adapter over a [`ConceptStream`] producing remote concept handles.
///
/// Single-pass and non-restartable; re-iterating requires a fresh accessor
/// call on the proxy.
pub struct ConceptIter {
    stream: ConceptStream,
    tx: Transaction,
}

impl fmt::Debug for ConceptIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConceptIter").finish_non_exhaustive()
    }
}

impl Iterator for ConceptIter {
    type Item = Result<RemoteConcept>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stream.next()? {
            Ok(StreamItem::Concept(message)) => Some(RemoteConcept::of(&message, &self.tx)),
            Ok(StreamItem::RolePlayer { role, .. }) => {
                Some(Err(GraphlingError::ProtocolViolation(format!(
                    "expected a concept item, received role player {}",
                    role.id
                ))))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
