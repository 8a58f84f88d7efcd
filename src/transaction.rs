//! The transaction dispatcher: the sole channel through which every remote
//! proxy operation is realized.
//!
//! A [`Transaction`] wraps the unary/streaming primitives supplied by the
//! transport collaborator (the [`Channel`] trait) behind a strictly
//! sequential dispatch: one in-flight unary call or stream pull at a time,
//! with responses observed in issue order. All waits are blocking and
//! synchronous at the call boundary.
//!
//! Streaming results are exposed as [`ConceptStream`], a lazy, single-pass,
//! non-restartable iterator over pages pulled from a server-side cursor.
//! Abandoning iteration early is permitted; the client simply stops pulling.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::codec::{IteratorId, MethodRequest, MethodResponse, StreamItem};
use crate::error::{GraphlingError, Result};

// ------------- Channel -------------

/// The request/response primitives the transport collaborator must supply.
///
/// `call` sends one unary operation and blocks for exactly one response.
/// `stream` opens a server-side cursor and returns its iterator id; `pull`
/// retrieves the next page for that cursor. Server-side failures surface as
/// [`GraphlingError::Server`].
pub trait Channel {
    fn call(&self, request: MethodRequest) -> Result<MethodResponse>;
    fn stream(&self, request: MethodRequest) -> Result<IteratorId>;
    fn pull(&self, iterator: IteratorId) -> Result<Page>;
}

pub use crate::codec::Page;

// ------------- Transaction -------------

struct TransactionInner {
    // the Mutex serializes all traffic: the protocol has no pipelining
    channel: Mutex<Box<dyn Channel>>,
    open: AtomicBool,
}

/// A handle to one open server transaction.
///
/// Cheap to clone; concept proxies hold a clone as a non-owning
/// back-reference. After [`Transaction::close`], every dispatch through any
/// clone fails with [`GraphlingError::TransactionClosed`].
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

impl Transaction {
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                channel: Mutex::new(channel),
                open: AtomicBool::new(true),
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// End the transaction. Idempotent; outstanding proxies and streams fail
    /// from here on.
    pub fn close(&self) {
        if self.inner.open.swap(false, Ordering::SeqCst) {
            debug!("transaction closed");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(GraphlingError::TransactionClosed)
        }
    }

    pub(crate) fn call(&self, request: MethodRequest) -> Result<MethodResponse> {
        self.ensure_open()?;
        trace!(concept = %request.concept_id, body = ?request.body, "unary call");
        let channel = self
            .inner
            .channel
            .lock()
            .map_err(|e| GraphlingError::Lock(e.to_string()))?;
        channel.call(request)
    }

    pub(crate) fn stream(&self, request: MethodRequest) -> Result<ConceptStream> {
        self.ensure_open()?;
        let iterator = {
            let channel = self
                .inner
                .channel
                .lock()
                .map_err(|e| GraphlingError::Lock(e.to_string()))?;
            channel.stream(request)?
        };
        debug!(iterator = iterator.0, "opened stream");
        Ok(ConceptStream {
            tx: self.clone(),
            iterator,
            buffer: VecDeque::new(),
            done: false,
        })
    }

    fn pull(&self, iterator: IteratorId) -> Result<Page> {
        self.ensure_open()?;
        trace!(iterator = iterator.0, "pull page");
        let channel = self
            .inner
            .channel
            .lock()
            .map_err(|e| GraphlingError::Lock(e.to_string()))?;
        channel.pull(iterator)
    }
}

// ------------- ConceptStream -------------

/// Lazy, single-pass cursor over a streaming result.
///
/// Each element is produced once, in server-determined order. Pages are
/// pulled on demand; a failed pull (including the transaction closing
/// mid-iteration) yields the error and ends the stream.
pub struct ConceptStream {
    tx: Transaction,
    iterator: IteratorId,
    buffer: VecDeque<StreamItem>,
    done: bool,
}

impl Iterator for ConceptStream {
    type Item = Result<StreamItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            match self.tx.pull(self.iterator) {
                Ok(page) => {
                    self.done = page.done;
                    self.buffer.extend(page.items);
                    if self.buffer.is_empty() && self.done {
                        return None;
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
