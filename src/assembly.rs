//! Per-friend reassembly state: incoming buffers, negotiated limits and
//! drop flags. Owned by the extension instance; mutated in place.

use std::collections::HashMap;

use crate::transport::FriendId;

/// In-progress incoming message for one friend. `total` is the size the
/// START packet declared; `data.len() <= total` holds at all times. An
/// append that would break it drops the message instead of writing.
#[derive(Debug, Default)]
pub struct IncomingMessage {
    data: Vec<u8>,
    total: u64,
}

impl IncomingMessage {
    /// Start a new message of `total` bytes, discarding whatever a prior
    /// aborted message left behind. Returns false and leaves the slot
    /// empty if the buffer cannot be allocated.
    pub fn begin(&mut self, total: u64) -> bool {
        self.clear();
        let Ok(capacity) = usize::try_from(total) else {
            return false;
        };
        if self.data.try_reserve_exact(capacity).is_err() {
            self.data = Vec::new();
            return false;
        }
        self.total = total;
        true
    }

    /// Append one chunk. Returns false and clears the slot if the chunk
    /// would exceed the declared total; a well-behaved sender never
    /// overruns the size it announced in START.
    pub fn append(&mut self, chunk: &[u8]) -> bool {
        if self.data.len() as u64 + chunk.len() as u64 > self.total {
            self.clear();
            return false;
        }
        self.data.extend_from_slice(chunk);
        true
    }

    /// Accumulated length so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop any buffered bytes and release the allocation. The slot stays
    /// registered for the friend.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.total = 0;
    }

    /// Take the assembled bytes, leaving the slot empty for the next
    /// message.
    pub fn take(&mut self) -> Vec<u8> {
        self.total = 0;
        std::mem::take(&mut self.data)
    }
}

/// Negotiated state for one friend: the size it declared it can receive,
/// and whether an oversize incoming message is currently being discarded.
#[derive(Debug, Clone, Copy)]
pub struct PeerState {
    pub max_send_size: u64,
    pub dropping: bool,
}

/// All mutable per-friend protocol state owned by one extension instance.
/// An incoming slot exists from the first negotiation event for a friend;
/// a `PeerState` exists only once that friend's NEGOTIATE arrived.
#[derive(Debug, Default)]
pub struct AssemblyStore {
    incoming: HashMap<FriendId, IncomingMessage>,
    peers: HashMap<FriendId, PeerState>,
}

impl AssemblyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the friend has an incoming-message slot (idempotent, so
    /// stray packets after a failed negotiation still find state).
    pub fn ensure_incoming(&mut self, friend: FriendId) {
        self.incoming.entry(friend).or_default();
    }

    pub fn incoming_mut(&mut self, friend: FriendId) -> &mut IncomingMessage {
        self.incoming.entry(friend).or_default()
    }

    /// Discard any buffered bytes for the friend. No-op if the friend has
    /// no slot yet.
    pub fn clear_incoming(&mut self, friend: FriendId) {
        if let Some(incoming) = self.incoming.get_mut(&friend) {
            incoming.clear();
        }
    }

    /// Record (or overwrite) the friend's declared receive limit. Resets
    /// the drop flag; re-negotiation starts from a clean slate.
    pub fn set_peer_limit(&mut self, friend: FriendId, max_send_size: u64) {
        self.peers.insert(
            friend,
            PeerState {
                max_send_size,
                dropping: false,
            },
        );
    }

    pub fn peer(&self, friend: FriendId) -> Option<&PeerState> {
        self.peers.get(&friend)
    }

    pub fn peer_mut(&mut self, friend: FriendId) -> Option<&mut PeerState> {
        self.peers.get_mut(&friend)
    }

    /// The friend's negotiated receive limit, if a NEGOTIATE arrived.
    pub fn max_send_size(&self, friend: FriendId) -> Option<u64> {
        self.peers.get(&friend).map(|p| p.max_send_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_within_total() {
        let mut msg = IncomingMessage::default();
        assert!(msg.begin(10));
        assert!(msg.append(b"hello"));
        assert!(msg.append(b"world"));
        assert_eq!(msg.take(), b"helloworld");
        assert!(msg.is_empty());
    }

    #[test]
    fn append_past_total_clears() {
        let mut msg = IncomingMessage::default();
        assert!(msg.begin(8));
        assert!(msg.append(b"hello"));
        assert!(!msg.append(b"world"));
        assert!(msg.is_empty());
        // A cleared slot has total 0, so any non-empty append fails too.
        assert!(!msg.append(b"x"));
    }

    #[test]
    fn append_without_begin_fails() {
        let mut msg = IncomingMessage::default();
        assert!(!msg.append(b"x"));
        // Empty chunks are a no-op either way.
        assert!(msg.append(&[]));
    }

    #[test]
    fn begin_resets_prior_contents() {
        let mut msg = IncomingMessage::default();
        assert!(msg.begin(5));
        assert!(msg.append(b"abc"));
        // New START replaces capacity and resets length, old bytes gone.
        assert!(msg.begin(4));
        assert_eq!(msg.len(), 0);
        assert!(msg.append(b"wxyz"));
        assert_eq!(msg.take(), b"wxyz");
    }

    #[test]
    fn renegotiation_overwrites_limit_and_drop_flag() {
        let mut store = AssemblyStore::new();
        let friend = FriendId(4);
        store.set_peer_limit(friend, 100);
        store.peer_mut(friend).unwrap().dropping = true;
        store.set_peer_limit(friend, 200);
        let peer = store.peer(friend).unwrap();
        assert_eq!(peer.max_send_size, 200);
        assert!(!peer.dropping);
    }

    #[test]
    fn unknown_friend_has_no_limit() {
        let store = AssemblyStore::new();
        assert_eq!(store.max_send_size(FriendId(9)), None);
        assert!(store.peer(FriendId(9)).is_none());
    }

    #[test]
    fn clear_incoming_without_slot_is_noop() {
        let mut store = AssemblyStore::new();
        store.clear_incoming(FriendId(1));
        store.ensure_incoming(FriendId(1));
        store.incoming_mut(FriendId(1)).begin(4);
        store.incoming_mut(FriendId(1)).append(b"ab");
        store.clear_incoming(FriendId(1));
        assert!(store.incoming_mut(FriendId(1)).is_empty());
    }
}
