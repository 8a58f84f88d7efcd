//! Shared test support: an in-memory reference server implementing the
//! transport [`Channel`] over a small graph store, plus a fixture wiring it
//! to an open transaction.
//!
//! Streaming results are paged two items at a time so cursor pulls are real
//! multi-page exchanges rather than a single burst.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use graphling::codec::{
    ConceptMessage, IteratorId, MethodBody, MethodRequest, MethodResponse, Page, StreamItem,
    WireValue,
};
use graphling::concept::{ConceptId, ConceptKind};
use graphling::datatype::{DataType, Value};
use graphling::error::{GraphlingError, Result};
use graphling::remote::{
    RemoteAttribute, RemoteAttributeType, RemoteConcept, RemoteEntityType, RemoteMetaType,
    RemoteRelationType, RemoteRole, RemoteRule,
};
use graphling::transaction::{Channel, Transaction};

pub const PAGE_SIZE: usize = 2;

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ------------- Graph store -------------

struct Node {
    kind: ConceptKind,
    label: Option<String>,
    sup: Option<ConceptId>,
    is_abstract: bool,
    data_type: Option<DataType>,
    regex: Option<String>,
    value: Option<WireValue>,
    type_of: Option<ConceptId>,
    inferred: bool,
    plays: Vec<ConceptId>,
    has: Vec<(ConceptId, bool)>,
    relates: Vec<ConceptId>,
    owned: Vec<ConceptId>,
    role_players: Vec<(ConceptId, ConceptId)>,
    when: Option<String>,
    then: Option<String>,
    deleted: bool,
}

impl Node {
    fn new(kind: ConceptKind) -> Self {
        Self {
            kind,
            label: None,
            sup: None,
            is_abstract: false,
            data_type: None,
            regex: None,
            value: None,
            type_of: None,
            inferred: false,
            plays: Vec::new(),
            has: Vec::new(),
            relates: Vec::new(),
            owned: Vec::new(),
            role_players: Vec::new(),
            when: None,
            then: None,
            deleted: false,
        }
    }
}

#[derive(Default)]
struct State {
    nodes: HashMap<ConceptId, Node>,
    order: Vec<ConceptId>,
    iterators: HashMap<IteratorId, VecDeque<StreamItem>>,
    next_id: u64,
    next_iterator: u64,
    pulls: u64,
}

impl State {
    fn allocate(&mut self, node: Node) -> ConceptId {
        self.next_id += 1;
        let id = ConceptId::of(format!("V{}", self.next_id));
        self.nodes.insert(id.clone(), node);
        self.order.push(id.clone());
        id
    }

    fn node(&self, id: &ConceptId) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphlingError::Server(format!("no concept with id {id}")))
    }

    fn node_mut(&mut self, id: &ConceptId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| GraphlingError::Server(format!("no concept with id {id}")))
    }

    fn describe(&self, id: &ConceptId) -> ConceptMessage {
        let node = &self.nodes[id];
        let mut message = ConceptMessage::new(id.clone(), node.kind);
        message.label = node.label.clone();
        if node.kind.is_type() && node.kind != ConceptKind::Role {
            message.is_abstract = Some(node.is_abstract);
        }
        message.data_type = node.data_type.map(|d| d.uid());
        message.regex = node.regex.clone();
        message.value = node.value.clone();
        if node.kind.is_thing() {
            message.is_inferred = Some(node.inferred);
            message.type_of = node
                .type_of
                .as_ref()
                .map(|t| Box::new(self.describe(t)));
        }
        message.when = node.when.clone();
        message.then = node.then.clone();
        message
    }

    /// Reflexive-transitive supertype chain, nearest first.
    fn lineage(&self, id: &ConceptId) -> Vec<ConceptId> {
        let mut chain = vec![id.clone()];
        let mut current = id.clone();
        while let Some(sup) = self.nodes[&current].sup.clone() {
            chain.push(sup.clone());
            current = sup;
        }
        chain
    }

    fn lineage_contains(&self, id: &ConceptId, ancestor: &ConceptId) -> bool {
        self.lineage(id).contains(ancestor)
    }

    /// Attribute types owned as keys anywhere in a type's lineage.
    fn effective_keys(&self, type_id: &ConceptId) -> Vec<ConceptId> {
        let mut keys = Vec::new();
        for ancestor in self.lineage(type_id) {
            for (attribute_type, key) in &self.nodes[&ancestor].has {
                if *key && !keys.contains(attribute_type) {
                    keys.push(attribute_type.clone());
                }
            }
        }
        keys
    }

    fn handle_call(&mut self, request: MethodRequest) -> Result<MethodResponse> {
        let id = request.concept_id.clone();
        let node = self.node(&id)?;
        if node.deleted && request.body != MethodBody::IsDeleted {
            return Err(GraphlingError::Server(format!(
                "concept {id} has been deleted"
            )));
        }
        match request.body {
            MethodBody::Delete => {
                self.node_mut(&id)?.deleted = true;
                Ok(MethodResponse::Unit)
            }
            MethodBody::IsDeleted => Ok(MethodResponse::Bool(node.deleted)),
            MethodBody::SchemaLabel => match &node.label {
                Some(label) => Ok(MethodResponse::Label(label.clone())),
                None => Err(GraphlingError::Server(format!("concept {id} has no label"))),
            },
            MethodBody::SchemaSetLabel(label) => {
                self.node_mut(&id)?.label = Some(label);
                Ok(MethodResponse::Unit)
            }
            MethodBody::SchemaSup => Ok(MethodResponse::OptionalConcept(
                node.sup.clone().map(|sup| self.describe(&sup)),
            )),
            MethodBody::SchemaSetSup(sup) => {
                self.node(&sup)?;
                self.node_mut(&id)?.sup = Some(sup);
                Ok(MethodResponse::Unit)
            }
            MethodBody::TypeIsAbstract => Ok(MethodResponse::Bool(node.is_abstract)),
            MethodBody::TypeSetAbstract(is_abstract) => {
                self.node_mut(&id)?.is_abstract = is_abstract;
                Ok(MethodResponse::Unit)
            }
            MethodBody::TypePlay(role) => {
                self.node(&role)?;
                let node = self.node_mut(&id)?;
                if !node.plays.contains(&role) {
                    node.plays.push(role);
                }
                Ok(MethodResponse::Unit)
            }
            MethodBody::TypeUnplay(role) => {
                self.node_mut(&id)?.plays.retain(|r| r != &role);
                Ok(MethodResponse::Unit)
            }
            MethodBody::TypeHas {
                attribute_type,
                key,
            } => {
                self.node(&attribute_type)?;
                let node = self.node_mut(&id)?;
                node.has.retain(|(a, _)| a != &attribute_type);
                node.has.push((attribute_type, key));
                Ok(MethodResponse::Unit)
            }
            MethodBody::TypeUnhas(attribute_type) => {
                self.node_mut(&id)?
                    .has
                    .retain(|(a, key)| *key || a != &attribute_type);
                Ok(MethodResponse::Unit)
            }
            MethodBody::TypeUnkey(attribute_type) => {
                self.node_mut(&id)?
                    .has
                    .retain(|(a, key)| !*key || a != &attribute_type);
                Ok(MethodResponse::Unit)
            }
            MethodBody::EntityTypeCreate => {
                if node.is_abstract {
                    return Err(GraphlingError::Server(format!(
                        "cannot create an instance of abstract type {id}"
                    )));
                }
                let mut entity = Node::new(ConceptKind::Entity);
                entity.type_of = Some(id.clone());
                let created = self.allocate(entity);
                Ok(MethodResponse::Concept(self.describe(&created)))
            }
            MethodBody::RelationTypeCreate => {
                if node.is_abstract {
                    return Err(GraphlingError::Server(format!(
                        "cannot create an instance of abstract type {id}"
                    )));
                }
                let mut relation = Node::new(ConceptKind::Relation);
                relation.type_of = Some(id.clone());
                let created = self.allocate(relation);
                Ok(MethodResponse::Concept(self.describe(&created)))
            }
            MethodBody::RelationTypeRelate(role) => {
                self.node(&role)?;
                let node = self.node_mut(&id)?;
                if !node.relates.contains(&role) {
                    node.relates.push(role);
                }
                Ok(MethodResponse::Unit)
            }
            MethodBody::RelationTypeUnrelate(role) => {
                self.node_mut(&id)?.relates.retain(|r| r != &role);
                Ok(MethodResponse::Unit)
            }
            MethodBody::AttributeTypeCreate(value) => {
                if node.is_abstract {
                    return Err(GraphlingError::Server(format!(
                        "cannot create an instance of abstract type {id}"
                    )));
                }
                let declared = node.data_type;
                let value_kind = Value::decode(&value)?.data_type();
                if declared != Some(value_kind) {
                    return Err(GraphlingError::Server(format!(
                        "attribute type {id} does not accept {value_kind} values"
                    )));
                }
                // value-addressed deduplication: an existing instance wins
                if let Some(existing) = self.find_attribute(&id, &value) {
                    return Ok(MethodResponse::Concept(self.describe(&existing)));
                }
                let mut attribute = Node::new(ConceptKind::Attribute);
                attribute.type_of = Some(id.clone());
                attribute.data_type = declared;
                attribute.value = Some(value);
                let created = self.allocate(attribute);
                Ok(MethodResponse::Concept(self.describe(&created)))
            }
            MethodBody::AttributeTypeAttribute(value) => Ok(MethodResponse::OptionalConcept(
                self.find_attribute(&id, &value)
                    .map(|found| self.describe(&found)),
            )),
            MethodBody::AttributeTypeDataType => Ok(MethodResponse::OptionalDataType(
                node.data_type.map(|d| d.uid()),
            )),
            MethodBody::AttributeTypeRegex => {
                Ok(MethodResponse::OptionalRegex(node.regex.clone()))
            }
            MethodBody::AttributeTypeSetRegex(regex) => {
                self.node_mut(&id)?.regex = regex;
                Ok(MethodResponse::Unit)
            }
            MethodBody::ThingType => {
                let type_of = node.type_of.clone().ok_or_else(|| {
                    GraphlingError::Server(format!("concept {id} has no type"))
                })?;
                Ok(MethodResponse::Concept(self.describe(&type_of)))
            }
            MethodBody::ThingIsInferred => Ok(MethodResponse::Bool(node.inferred)),
            MethodBody::ThingHas(attribute) => {
                if self.node(&attribute)?.kind != ConceptKind::Attribute {
                    return Err(GraphlingError::Server(format!(
                        "concept {attribute} is not an attribute"
                    )));
                }
                let node = self.node_mut(&id)?;
                if !node.owned.contains(&attribute) {
                    node.owned.push(attribute);
                }
                Ok(MethodResponse::Unit)
            }
            MethodBody::ThingUnhas(attribute) => {
                self.node_mut(&id)?.owned.retain(|a| a != &attribute);
                Ok(MethodResponse::Unit)
            }
            MethodBody::RelationAssign { role, player } => {
                self.node(&role)?;
                self.node(&player)?;
                let pair = (role, player);
                let node = self.node_mut(&id)?;
                if !node.role_players.contains(&pair) {
                    node.role_players.push(pair);
                }
                Ok(MethodResponse::Unit)
            }
            MethodBody::RelationUnassign { role, player } => {
                self.node_mut(&id)?
                    .role_players
                    .retain(|(r, p)| r != &role || p != &player);
                Ok(MethodResponse::Unit)
            }
            MethodBody::AttributeValue => match &node.value {
                Some(value) => Ok(MethodResponse::Value(value.clone())),
                None => Err(GraphlingError::Server(format!(
                    "concept {id} carries no value"
                ))),
            },
            MethodBody::RuleWhen => Ok(MethodResponse::OptionalPattern(node.when.clone())),
            MethodBody::RuleThen => Ok(MethodResponse::OptionalPattern(node.then.clone())),
            streaming => Err(GraphlingError::Server(format!(
                "operation {streaming:?} opens a stream, not a unary call"
            ))),
        }
    }

    fn find_attribute(&self, attribute_type: &ConceptId, value: &WireValue) -> Option<ConceptId> {
        self.order.iter().cloned().find(|id| {
            let node = &self.nodes[id];
            node.kind == ConceptKind::Attribute
                && !node.deleted
                && node.type_of.as_ref() == Some(attribute_type)
                && node.value.as_ref() == Some(value)
        })
    }

    fn handle_stream(&self, request: MethodRequest) -> Result<Vec<StreamItem>> {
        let id = request.concept_id.clone();
        let node = self.node(&id)?;
        if node.deleted {
            return Err(GraphlingError::Server(format!(
                "concept {id} has been deleted"
            )));
        }
        let concepts: Vec<ConceptId> = match request.body {
            MethodBody::SchemaSups => self.lineage(&id),
            MethodBody::SchemaSubs => self
                .order
                .iter()
                .filter(|candidate| {
                    let node = &self.nodes[*candidate];
                    !node.deleted
                        && node.kind.is_schema_concept()
                        && self.lineage_contains(candidate, &id)
                })
                .cloned()
                .collect(),
            MethodBody::TypePlaying => node.plays.clone(),
            MethodBody::TypeAttributes => node.has.iter().map(|(a, _)| a.clone()).collect(),
            MethodBody::TypeKeys => node
                .has
                .iter()
                .filter(|(_, key)| *key)
                .map(|(a, _)| a.clone())
                .collect(),
            MethodBody::TypeInstances => self
                .order
                .iter()
                .filter(|candidate| {
                    let candidate_node = &self.nodes[*candidate];
                    candidate_node.kind.is_thing()
                        && !candidate_node.deleted
                        && candidate_node
                            .type_of
                            .as_ref()
                            .is_some_and(|t| self.lineage_contains(t, &id))
                })
                .cloned()
                .collect(),
            MethodBody::RelationTypeRoles => node.relates.clone(),
            MethodBody::ThingAttributes(filter) => node
                .owned
                .iter()
                .filter(|a| {
                    filter.is_empty()
                        || self.nodes[*a]
                            .type_of
                            .as_ref()
                            .is_some_and(|t| filter.contains(t))
                })
                .cloned()
                .collect(),
            MethodBody::ThingKeys(filter) => {
                let type_of = node.type_of.clone().ok_or_else(|| {
                    GraphlingError::Server(format!("concept {id} has no type"))
                })?;
                let keys = self.effective_keys(&type_of);
                node.owned
                    .iter()
                    .filter(|a| {
                        self.nodes[*a].type_of.as_ref().is_some_and(|t| {
                            keys.contains(t) && (filter.is_empty() || filter.contains(t))
                        })
                    })
                    .cloned()
                    .collect()
            }
            MethodBody::ThingRelations(filter) => self
                .order
                .iter()
                .filter(|candidate| {
                    let relation = &self.nodes[*candidate];
                    relation.kind == ConceptKind::Relation
                        && !relation.deleted
                        && relation.role_players.iter().any(|(role, player)| {
                            player == &id && (filter.is_empty() || filter.contains(role))
                        })
                })
                .cloned()
                .collect(),
            MethodBody::ThingRoles => {
                let mut roles = Vec::new();
                for candidate in &self.order {
                    let relation = &self.nodes[candidate];
                    if relation.kind != ConceptKind::Relation || relation.deleted {
                        continue;
                    }
                    for (role, player) in &relation.role_players {
                        if player == &id && !roles.contains(role) {
                            roles.push(role.clone());
                        }
                    }
                }
                roles
            }
            MethodBody::RelationRolePlayersMap => {
                return Ok(node
                    .role_players
                    .iter()
                    .map(|(role, player)| StreamItem::RolePlayer {
                        role: self.describe(role),
                        player: self.describe(player),
                    })
                    .collect());
            }
            MethodBody::RelationRolePlayers(filter) => {
                let mut players = Vec::new();
                for (role, player) in &node.role_players {
                    if (filter.is_empty() || filter.contains(role)) && !players.contains(player) {
                        players.push(player.clone());
                    }
                }
                players
            }
            MethodBody::AttributeOwners => self
                .order
                .iter()
                .filter(|candidate| {
                    let owner = &self.nodes[*candidate];
                    owner.kind.is_thing() && !owner.deleted && owner.owned.contains(&id)
                })
                .cloned()
                .collect(),
            MethodBody::RoleRelations => self
                .order
                .iter()
                .filter(|candidate| {
                    let relation_type = &self.nodes[*candidate];
                    relation_type.kind == ConceptKind::RelationType
                        && !relation_type.deleted
                        && relation_type.relates.contains(&id)
                })
                .cloned()
                .collect(),
            MethodBody::RolePlayers => self
                .order
                .iter()
                .filter(|candidate| {
                    let player_type = &self.nodes[*candidate];
                    !player_type.deleted && player_type.plays.contains(&id)
                })
                .cloned()
                .collect(),
            unary => {
                return Err(GraphlingError::Server(format!(
                    "operation {unary:?} is unary, not a stream"
                )));
            }
        };
        Ok(concepts
            .iter()
            .map(|concept| StreamItem::Concept(self.describe(concept)))
            .collect())
    }
}

// ------------- TestServer -------------

#[derive(Clone)]
pub struct TestServer {
    state: Arc<Mutex<State>>,
}

impl TestServer {
    pub fn new() -> Self {
        let server = Self {
            state: Arc::new(Mutex::new(State::default())),
        };
        // meta roots: one per lineage, plus the meta rule
        {
            let mut state = server.state.lock().unwrap();
            let mut thing = Node::new(ConceptKind::MetaType);
            thing.label = Some("thing".to_owned());
            thing.is_abstract = true;
            let thing_id = state.allocate(thing);
            for label in ["entity", "relation", "attribute"] {
                let mut meta = Node::new(ConceptKind::MetaType);
                meta.label = Some(label.to_owned());
                meta.is_abstract = true;
                meta.sup = Some(thing_id.clone());
                state.allocate(meta);
            }
            let mut role = Node::new(ConceptKind::MetaType);
            role.label = Some("role".to_owned());
            role.is_abstract = true;
            state.allocate(role);
            let mut rule = Node::new(ConceptKind::Rule);
            rule.label = Some("rule".to_owned());
            state.allocate(rule);
        }
        server
    }

    fn meta(&self, label: &str) -> ConceptId {
        self.lookup(label).expect("meta concept is seeded").id
    }

    pub fn put_entity_type(&self, label: &str) -> ConceptMessage {
        let mut node = Node::new(ConceptKind::EntityType);
        node.label = Some(label.to_owned());
        node.sup = Some(self.meta("entity"));
        self.insert(node)
    }

    pub fn put_relation_type(&self, label: &str) -> ConceptMessage {
        let mut node = Node::new(ConceptKind::RelationType);
        node.label = Some(label.to_owned());
        node.sup = Some(self.meta("relation"));
        self.insert(node)
    }

    pub fn put_attribute_type(&self, label: &str, data_type: DataType) -> ConceptMessage {
        let mut node = Node::new(ConceptKind::AttributeType);
        node.label = Some(label.to_owned());
        node.sup = Some(self.meta("attribute"));
        node.data_type = Some(data_type);
        self.insert(node)
    }

    pub fn put_role(&self, label: &str) -> ConceptMessage {
        let mut node = Node::new(ConceptKind::Role);
        node.label = Some(label.to_owned());
        node.sup = Some(self.meta("role"));
        self.insert(node)
    }

    pub fn put_rule(&self, label: &str, when: &str, then: &str) -> ConceptMessage {
        let mut node = Node::new(ConceptKind::Rule);
        node.label = Some(label.to_owned());
        node.sup = Some(self.meta("rule"));
        node.when = Some(when.to_owned());
        node.then = Some(then.to_owned());
        self.insert(node)
    }

    fn insert(&self, node: Node) -> ConceptMessage {
        let kind = node.kind;
        let mut state = self.state.lock().unwrap();
        let id = state.allocate(node);
        ConceptMessage::new(id, kind)
    }

    /// Look a concept up by label, as an independent path of obtaining a
    /// proxy for the same element. Returns a bare identity message.
    pub fn lookup(&self, label: &str) -> Option<ConceptMessage> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .find(|id| state.nodes[*id].label.as_deref() == Some(label))
            .map(|id| ConceptMessage::new(id.clone(), state.nodes[id].kind))
    }

    /// The full wire message for a concept picked by id. Things carry no
    /// label, so this is the way to snapshot them.
    pub fn describe_id(&self, id: &ConceptId) -> ConceptMessage {
        self.state.lock().unwrap().describe(id)
    }

    /// The full wire message for a concept, as a query result would carry it.
    pub fn describe(&self, label: &str) -> Option<ConceptMessage> {
        let state = self.state.lock().unwrap();
        state
            .order
            .iter()
            .find(|id| state.nodes[*id].label.as_deref() == Some(label))
            .map(|id| state.describe(id))
    }

    pub fn pull_count(&self) -> u64 {
        self.state.lock().unwrap().pulls
    }
}

impl Channel for TestServer {
    fn call(&self, request: MethodRequest) -> Result<MethodResponse> {
        self.state.lock().unwrap().handle_call(request)
    }

    fn stream(&self, request: MethodRequest) -> Result<IteratorId> {
        let mut state = self.state.lock().unwrap();
        let items = state.handle_stream(request)?;
        state.next_iterator += 1;
        let iterator = IteratorId(state.next_iterator);
        state.iterators.insert(iterator, items.into());
        Ok(iterator)
    }

    fn pull(&self, iterator: IteratorId) -> Result<Page> {
        let mut state = self.state.lock().unwrap();
        state.pulls += 1;
        let items = state
            .iterators
            .get_mut(&iterator)
            .ok_or_else(|| GraphlingError::Server(format!("unknown iterator {}", iterator.0)))?;
        let page: Vec<StreamItem> = items.drain(..items.len().min(PAGE_SIZE)).collect();
        let done = items.is_empty();
        if done {
            state.iterators.remove(&iterator);
        }
        Ok(Page { items: page, done })
    }
}

// ------------- Fixture -------------

/// A transaction bound to a fresh reference server.
pub struct Fixture {
    pub server: TestServer,
    pub tx: Transaction,
}

pub fn setup() -> Fixture {
    init_tracing();
    let server = TestServer::new();
    let tx = Transaction::new(Box::new(server.clone()));
    Fixture { server, tx }
}

impl Fixture {
    pub fn remote(&self, message: &ConceptMessage) -> RemoteConcept {
        RemoteConcept::of(message, &self.tx).unwrap()
    }

    pub fn entity_type(&self, label: &str) -> RemoteEntityType {
        self.remote(&self.server.put_entity_type(label))
            .as_entity_type()
            .unwrap()
    }

    pub fn relation_type(&self, label: &str) -> RemoteRelationType {
        self.remote(&self.server.put_relation_type(label))
            .as_relation_type()
            .unwrap()
    }

    pub fn attribute_type(&self, label: &str, data_type: DataType) -> RemoteAttributeType {
        self.remote(&self.server.put_attribute_type(label, data_type))
            .as_attribute_type()
            .unwrap()
    }

    pub fn role(&self, label: &str) -> RemoteRole {
        self.remote(&self.server.put_role(label)).as_role().unwrap()
    }

    pub fn rule(&self, label: &str, when: &str, then: &str) -> RemoteRule {
        self.remote(&self.server.put_rule(label, when, then))
            .as_rule()
            .unwrap()
    }

    pub fn meta_type(&self, label: &str) -> RemoteMetaType {
        self.remote(&self.server.lookup(label).unwrap())
            .as_meta_type()
            .unwrap()
    }

    pub fn meta_rule(&self) -> RemoteRule {
        self.remote(&self.server.lookup("rule").unwrap())
            .as_rule()
            .unwrap()
    }
}

/// Collect a concept iterator, failing the test on any stream error.
pub fn collect(iter: graphling::remote::ConceptIter) -> Vec<RemoteConcept> {
    iter.collect::<Result<Vec<_>>>().unwrap()
}

/// Create an attribute and narrow it, one call.
pub fn put_attribute(attribute_type: &RemoteAttributeType, value: Value) -> RemoteAttribute {
    attribute_type.create(value).unwrap()
}
