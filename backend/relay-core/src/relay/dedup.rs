//! Bounded memory of forwarded payloads whose ack was lost.
//!
//! The broker requeues exactly those messages, so a redelivery matching a
//! digest here was already shown. Payloads that were acked are never recorded:
//! the broker will not send them again, and a later message with the same text
//! is a new one. Digests are SHA-256 of the raw payload; the oldest digest is
//! evicted once `capacity` is reached.

use std::collections::{HashSet, VecDeque};

use sha2::{Digest, Sha256};

pub type PayloadDigest = [u8; 32];

pub struct ForwardedDigests {
    capacity: usize,
    order: VecDeque<PayloadDigest>,
    seen: HashSet<PayloadDigest>,
}

impl ForwardedDigests {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    pub fn digest(payload: &[u8]) -> PayloadDigest {
        Sha256::digest(payload).into()
    }

    pub fn contains(&self, digest: &PayloadDigest) -> bool {
        self.seen.contains(digest)
    }

    pub fn record(&mut self, digest: PayloadDigest) {
        if !self.seen.insert(digest) {
            return;
        }

        self.order.push_back(digest);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
    }

    /// Forget `digest`, returning whether it was present.
    pub fn remove(&mut self, digest: &PayloadDigest) -> bool {
        if !self.seen.remove(digest) {
            return false;
        }
        self.order.retain(|d| d != digest);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
