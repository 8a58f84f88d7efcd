//! Graphling – a typed client-side model of a remote graph database.
//!
//! Graphling exposes every element of the graph as a polymorphic *concept*
//! proxy that is manipulated locally while its state lives on a server
//! reached through a blocking request/response protocol:
//! * A [`concept::ConceptId`] is an opaque identity; a [`concept::Label`]
//!   names a schema concept.
//! * The [`concept::ConceptKind`] enum closes over the nine concept kinds
//!   (entities, relations, attributes, their types, roles, rules and meta
//!   types).
//! * A [`local::LocalConcept`] is a frozen snapshot, fully decoded from a
//!   wire message at construction and never re-fetched.
//! * A [`remote::RemoteConcept`] is a live handle carrying only `(id, kind)`
//!   and a transaction reference; every accessor issues a fresh call.
//!
//! ## Modules
//! * [`concept`] – Identifiers, the kind lattice and identity equality.
//! * [`datatype`] – The five-kind attribute value set and its exact
//!   round-trip encoding.
//! * [`codec`] – Wire messages (requests, responses, pages) and the typed
//!   extraction rules that turn a response case into a value or a protocol
//!   violation.
//! * [`transaction`] – The dispatcher: strictly sequential unary calls and
//!   the paged streaming cursor, over a transport-supplied [`transaction::Channel`].
//! * [`local`] – Snapshot variants and the Local concept factory.
//! * [`remote`] – Live handles, the capability traits
//!   ([`remote::SchemaConceptOps`], [`remote::TypeOps`], [`remote::ThingOps`])
//!   and the Remote concept factory.
//! * [`error`] – The [`error::GraphlingError`] taxonomy; nothing is ever
//!   logged-and-swallowed.
//!
//! ## Bindings
//! Narrowing (`as_entity`, `as_relation_type`, …) is explicit and checked:
//! exactly one narrowing succeeds per concept kind and every other one
//! reports an invalid casting error naming the requested and actual kind.
//! Narrowing never crosses the Local/Remote axis.
//!
//! ## Quick Start
//! Decoding a local snapshot requires no server at all:
//! ```
//! use graphling::codec::ConceptMessage;
//! use graphling::concept::{Concept, ConceptId, ConceptKind};
//! use graphling::local::LocalConcept;
//!
//! let mut message = ConceptMessage::new(ConceptId::of("V123"), ConceptKind::EntityType);
//! message.label = Some("person".to_owned());
//! message.is_abstract = Some(false);
//!
//! let person = LocalConcept::of(message).unwrap();
//! assert_eq!(person.kind(), ConceptKind::EntityType);
//! assert_eq!(person.as_entity_type().unwrap().label().as_str(), "person");
//! assert!(person.as_role().is_err());
//! ```
//!
//! Remote proxies are produced the same way from wire messages, except bound
//! to an open [`transaction::Transaction`] whose [`transaction::Channel`] is
//! supplied by the transport collaborator.

pub mod codec;
pub mod concept;
pub mod datatype;
pub mod error;
pub mod local;
pub mod remote;
pub mod transaction;
