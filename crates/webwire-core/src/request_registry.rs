//! Per-connection request-id → awaiter map.
//!
//! A request is inserted when the local side sends it and removed on
//! exactly one of: a matching `Reply`/`ErrorReply` arrives, the deadline
//! elapses, or the connection is torn down. A reply that arrives after the
//! id has already been released (timeout or disconnect) is discarded
//! silently by the caller, since [`RequestRegistry::resolve_reply`] simply
//! returns `false` when there is no matching awaiter.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{collections::HashMap, sync::Mutex};

use tokio::sync::oneshot;
use webwire_proto::{MessageIdentifier, Payload};

use crate::WireError;

/// The end of a single outstanding request's awaiter that the sender side
/// (the request registry) holds.
type Waiter = oneshot::Sender<Result<Payload, WireError>>;

/// Maps a connection's in-flight request ids to the task awaiting each
/// reply.
#[derive(Default)]
pub struct RequestRegistry {
    awaiters: Mutex<HashMap<MessageIdentifier, Waiter>>,
}

impl RequestRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly sent request, returning the receiver the caller
    /// should await (typically behind `tokio::time::timeout`).
    ///
    /// # Panics
    ///
    /// Panics if `id` is already registered: request-ids must be drawn to
    /// avoid collision with the current outstanding set, so a collision
    /// here indicates a caller bug, not a protocol condition.
    pub fn register(&self, id: MessageIdentifier) -> oneshot::Receiver<Result<Payload, WireError>> {
        self.try_register(id).expect("invariant: request id reused while still outstanding")
    }

    /// Like [`Self::register`], but returns `None` instead of panicking when
    /// `id` is already outstanding. Lets a caller that draws its own ids
    /// retry with a fresh draw on the rare collision instead of crashing.
    pub fn try_register(
        &self,
        id: MessageIdentifier,
    ) -> Option<oneshot::Receiver<Result<Payload, WireError>>> {
        use std::collections::hash_map::Entry;

        let (tx, rx) = oneshot::channel();
        match self.awaiters.lock().expect("request registry lock poisoned").entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(tx);
                Some(rx)
            },
        }
    }

    /// Resolve an outstanding request with a successful reply payload.
    /// Returns `false` if no awaiter is registered for `id` (already timed
    /// out, already resolved, or never ours).
    pub fn resolve_reply(&self, id: MessageIdentifier, payload: Payload) -> bool {
        self.complete(id, Ok(payload))
    }

    /// Resolve an outstanding request with an error reply, reconstructing
    /// the framework's typed [`WireError`] variants from their well-known
    /// wire codes (see [`WireError::from_wire_code`]) and falling back to
    /// [`WireError::ReqErr`] for application-defined codes.
    pub fn resolve_error(&self, id: MessageIdentifier, code: String, message: String) -> bool {
        self.complete(id, Err(WireError::from_wire_code(&code, message)))
    }

    fn complete(&self, id: MessageIdentifier, outcome: Result<Payload, WireError>) -> bool {
        let waiter = self.awaiters.lock().expect("request registry lock poisoned").remove(&id);
        match waiter {
            Some(tx) => {
                let _ignored_if_caller_already_gave_up = tx.send(outcome);
                true
            },
            None => false,
        }
    }

    /// Release `id` without resolving it, e.g. after a deadline elapses.
    /// A reply that arrives afterwards finds no awaiter and is discarded.
    pub fn release(&self, id: MessageIdentifier) {
        self.awaiters.lock().expect("request registry lock poisoned").remove(&id);
    }

    /// Resolve every outstanding awaiter with
    /// [`WireError::DisconnectedErr`] and clear the registry. Called once
    /// when the connection's inbound loop ends.
    pub fn disconnect_all(&self) {
        let waiters: Vec<Waiter> =
            self.awaiters.lock().expect("request registry lock poisoned").drain().map(|(_, tx)| tx).collect();
        for tx in waiters {
            let _ignored_if_caller_already_gave_up = tx.send(Err(WireError::DisconnectedErr));
        }
    }

    /// Number of requests currently awaiting a reply.
    pub fn outstanding_count(&self) -> usize {
        self.awaiters.lock().expect("request registry lock poisoned").len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use webwire_proto::Encoding;

    fn id(byte: u8) -> MessageIdentifier {
        MessageIdentifier::from_bytes([byte; 8])
    }

    #[tokio::test]
    async fn reply_resolves_the_matching_awaiter() {
        let registry = RequestRegistry::new();
        let rx = registry.register(id(1));

        let payload = Payload::new(Encoding::Binary, vec![1, 2, 3]);
        assert!(registry.resolve_reply(id(1), payload.clone()));

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.unwrap(), payload);
        assert_eq!(registry.outstanding_count(), 0);
    }

    #[tokio::test]
    async fn late_reply_after_release_is_discarded() {
        let registry = RequestRegistry::new();
        let _rx = registry.register(id(2));
        registry.release(id(2));

        let delivered = registry.resolve_reply(id(2), Payload::new(Encoding::Binary, vec![]));
        assert!(!delivered);
    }

    #[tokio::test]
    async fn disconnect_all_resolves_every_outstanding_request() {
        let registry = RequestRegistry::new();
        let rx1 = registry.register(id(3));
        let rx2 = registry.register(id(4));

        registry.disconnect_all();

        assert_eq!(rx1.await.unwrap().unwrap_err(), WireError::DisconnectedErr);
        assert_eq!(rx2.await.unwrap().unwrap_err(), WireError::DisconnectedErr);
        assert_eq!(registry.outstanding_count(), 0);
    }

    #[tokio::test]
    async fn error_reply_resolves_as_req_err() {
        let registry = RequestRegistry::new();
        let rx = registry.register(id(5));
        registry.resolve_error(id(5), "bad_password".to_string(), "nope".to_string());

        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            WireError::ReqErr {
                code: webwire_proto::ErrorCode::new("bad_password"),
                message: "nope".to_string(),
            }
        );
    }

    #[test]
    #[should_panic(expected = "reused while still outstanding")]
    fn registering_a_duplicate_id_panics() {
        let registry = RequestRegistry::new();
        let _rx1 = registry.register(id(9));
        let _rx2 = registry.register(id(9));
    }
}
