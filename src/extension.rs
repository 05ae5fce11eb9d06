//! Extension instance: size negotiation, the receive-side state machine,
//! and sending. Single-threaded and synchronous; every entry point runs
//! to completion on the caller's thread.

use log::{debug, warn};

use crate::assembly::AssemblyStore;
use crate::chunk;
use crate::transport::{FriendId, PacketList, Transport};
use crate::wire::{self, DecodeError, Packet, ReceiptId};

/// Application callbacks, invoked synchronously from the dispatch entry
/// points. Context a callback needs travels in its closure capture.
pub struct Callbacks {
    /// A whole message arrived. The bytes are only valid for the call;
    /// copy what outlives it.
    pub received: Box<dyn FnMut(FriendId, &[u8])>,
    /// The friend acknowledged receipt of a message sent earlier.
    pub receipt: Box<dyn FnMut(FriendId, ReceiptId)>,
    /// Negotiation finished. `true` means the friend's receive limit is
    /// known and [`MessagesExtension::send`] may be used.
    pub negotiated: Box<dyn FnMut(FriendId, bool)>,
}

/// Error from [`MessagesExtension::send`] and the size queries. These are
/// the only synchronously surfaced failures; protocol-level faults drop
/// the affected message silently instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("friend has not negotiated a receive limit")]
    UnknownPeer,
    #[error("message exceeds the friend's receive limit")]
    MessageTooLarge,
}

/// One registration of the extension on a transport. Owns all per-friend
/// state; drive it from one thread (or serialize externally).
pub struct MessagesExtension<T: Transport> {
    transport: T,
    callbacks: Callbacks,
    max_receive_size: u64,
    next_receipt_id: u64,
    store: AssemblyStore,
}

impl<T: Transport> MessagesExtension<T> {
    /// Bind the extension to a transport. `max_receive_size` is the
    /// largest message this side will accept, advertised to every friend
    /// during negotiation; constant for the instance's lifetime.
    pub fn register(transport: T, callbacks: Callbacks, max_receive_size: u64) -> Self {
        Self {
            transport,
            callbacks,
            max_receive_size,
            next_receipt_id: 0,
            store: AssemblyStore::new(),
        }
    }

    /// Ask the transport to run its compatibility handshake with a
    /// friend. The outcome comes back through [`handle_negotiated`].
    ///
    /// [`handle_negotiated`]: MessagesExtension::handle_negotiated
    pub fn negotiate(&mut self, friend: FriendId) {
        self.transport.negotiate(friend);
    }

    /// Transport dispatch: the compatibility handshake for `friend`
    /// finished. On success the size handshake goes out on `response`;
    /// the negotiated callback fires only once the friend's own NEGOTIATE
    /// arrives, because only then is its limit known.
    pub fn handle_negotiated(&mut self, friend: FriendId, compatible: bool, response: &mut PacketList) {
        self.store.ensure_incoming(friend);
        if compatible {
            response.append_segment(wire::encode(&Packet::Negotiate {
                max_receive_size: self.max_receive_size,
            }));
        } else {
            (self.callbacks.negotiated)(friend, false);
        }
    }

    /// Transport dispatch: one raw segment arrived from `friend`.
    /// Replies (receipts, the size handshake) are queued on `response`
    /// for the transport to flush.
    pub fn handle_segment(&mut self, friend: FriendId, segment: &[u8], response: &mut PacketList) {
        let packet = match wire::decode(segment) {
            Ok(packet) => packet,
            Err(err) => {
                self.drop_in_progress(friend, err);
                return;
            }
        };
        match packet {
            Packet::Negotiate { max_receive_size } => {
                debug!("friend {} accepts up to {max_receive_size} bytes", friend.0);
                self.store.set_peer_limit(friend, max_receive_size);
                (self.callbacks.negotiated)(friend, true);
            }
            Packet::Start { total_size, data } => self.handle_start(friend, total_size, data),
            Packet::Part { data } => self.handle_part(friend, data),
            Packet::Finish { receipt_id, data } => {
                self.handle_finish(friend, receipt_id, data, response);
            }
            Packet::Received { receipt_id } => (self.callbacks.receipt)(friend, receipt_id),
        }
    }

    fn drop_in_progress(&mut self, friend: FriendId, err: DecodeError) {
        warn!("undecodable segment from friend {}: {err}", friend.0);
        self.store.clear_incoming(friend);
    }

    fn handle_start(&mut self, friend: FriendId, total_size: u64, data: &[u8]) {
        let Some(peer) = self.store.peer_mut(friend) else {
            // Data before the friend's NEGOTIATE; nothing to assemble into.
            return;
        };
        if total_size > self.max_receive_size {
            warn!(
                "friend {} declared a {total_size}-byte message, over our limit of {}",
                friend.0, self.max_receive_size
            );
            peer.dropping = true;
            return;
        }
        if !self.store.incoming_mut(friend).begin(total_size) {
            warn!(
                "no buffer for a {total_size}-byte message from friend {}",
                friend.0
            );
            if let Some(peer) = self.store.peer_mut(friend) {
                peer.dropping = true;
            }
            return;
        }
        self.store.incoming_mut(friend).append(data);
    }

    fn handle_part(&mut self, friend: FriendId, data: &[u8]) {
        let Some(peer) = self.store.peer(friend) else {
            return;
        };
        if peer.dropping {
            self.store.clear_incoming(friend);
            return;
        }
        // Overrunning the declared total clears the slot inside append.
        self.store.incoming_mut(friend).append(data);
    }

    fn handle_finish(
        &mut self,
        friend: FriendId,
        receipt_id: ReceiptId,
        data: &[u8],
        response: &mut PacketList,
    ) {
        if self.store.peer(friend).is_none() {
            return;
        }

        if self.store.incoming_mut(friend).is_empty() {
            // Message fit in a single segment; no START was ever sent.
            let was_dropping = self.take_dropping(friend);
            if was_dropping || data.len() as u64 > self.max_receive_size {
                self.store.clear_incoming(friend);
                return;
            }
            (self.callbacks.received)(friend, data);
            response.append_segment(wire::encode(&Packet::Received { receipt_id }));
            return;
        }

        let appended = self.store.incoming_mut(friend).append(data);
        let was_dropping = self.take_dropping(friend);
        if !appended {
            // Final chunk overran the declared total; slot already cleared.
            return;
        }
        let incoming = self.store.incoming_mut(friend);
        if was_dropping || incoming.len() as u64 > self.max_receive_size {
            incoming.clear();
            return;
        }
        let message = incoming.take();
        (self.callbacks.received)(friend, &message);
        response.append_segment(wire::encode(&Packet::Received { receipt_id }));
    }

    /// Read and reset the drop flag; FINISH always clears it, whatever
    /// the outcome.
    fn take_dropping(&mut self, friend: FriendId) -> bool {
        match self.store.peer_mut(friend) {
            Some(peer) => std::mem::replace(&mut peer.dropping, false),
            None => false,
        }
    }

    /// Queue `data` to `friend` as one ordered run of wire segments on
    /// `packet`. Returns the receipt id the friend will acknowledge with
    /// once it reassembled the whole message.
    pub fn send(
        &mut self,
        packet: &mut PacketList,
        friend: FriendId,
        data: &[u8],
    ) -> Result<ReceiptId, SendError> {
        let limit = self.max_sendable_size(friend)?;
        if data.len() as u64 > limit {
            return Err(SendError::MessageTooLarge);
        }
        let receipt_id = ReceiptId(self.next_receipt_id);
        self.next_receipt_id = self.next_receipt_id.wrapping_add(1);
        chunk::chunk_message(packet, data, receipt_id, self.transport.max_segment_size());
        Ok(receipt_id)
    }

    /// Largest message this instance will accept from any friend.
    pub fn max_receivable_size(&self) -> u64 {
        self.max_receive_size
    }

    /// Largest message `friend` has declared it will accept, once its
    /// NEGOTIATE arrived.
    pub fn max_sendable_size(&self, friend: FriendId) -> Result<u64, SendError> {
        self.store
            .max_send_size(friend)
            .ok_or(SendError::UnknownPeer)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
