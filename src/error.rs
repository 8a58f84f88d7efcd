//! The error taxonomy. Every fallible operation reports one of these;
//! nothing is logged-and-swallowed.

use thiserror::Error;

use crate::concept::{ConceptId, ConceptKind};

#[derive(Error, Debug)]
pub enum GraphlingError {
    #[error("Invalid casting: concept {id} is a {actual}, not a {requested}")]
    InvalidCasting {
        id: ConceptId,
        actual: ConceptKind,
        requested: &'static str,
    },
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Transaction closed")]
    TransactionClosed,
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("Rejected by server: {0}")]
    Server(String),
}

pub type Result<T> = std::result::Result<T, GraphlingError>;
