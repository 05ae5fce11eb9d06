//! Transport boundary: friend handles, outgoing segment batches, and the
//! hooks this crate needs from its host transport.

/// Friend handle assigned by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FriendId(pub u32);

/// Ordered batch of wire segments bound for one friend. Segments queued
/// together are flushed by the transport as one unit, in queue order;
/// all chunks of one message always share a batch.
#[derive(Debug, Default)]
pub struct PacketList {
    segments: Vec<Vec<u8>>,
}

impl PacketList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one wire segment at the end of the batch.
    pub fn append_segment(&mut self, segment: Vec<u8>) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    /// Hand the batch over for flushing.
    pub fn into_segments(self) -> Vec<Vec<u8>> {
        self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// What the extension needs from the transport it is registered on. The
/// transport must deliver segments in order and at most once; the
/// dispatch entry points on `MessagesExtension` assume it.
pub trait Transport {
    /// Largest raw segment the transport will carry for this extension.
    /// Constant for the life of the registration, and at least one byte
    /// larger than the biggest packet header.
    fn max_segment_size(&self) -> usize;

    /// Start the transport's own compatibility handshake with a friend.
    /// The outcome arrives later through
    /// [`MessagesExtension::handle_negotiated`](crate::MessagesExtension::handle_negotiated).
    fn negotiate(&mut self, friend: FriendId);
}
