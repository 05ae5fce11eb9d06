//! Large-message extension for segment-oriented peer transports.
//! Host-driven: no I/O; the transport hands in segments and flushes the
//! reply batches this crate queues.
//!
//! The underlying transport moves opaque segments of bounded size between
//! friends, in order and at most once, but has no framing for anything
//! larger than one segment. This crate layers on top of it: a size
//! handshake so each side knows how much the other will accept, chunking
//! of arbitrarily large messages into transport segments, reassembly on
//! the far side, and a delivery receipt once a whole message has been
//! rebuilt. Misbehaving peers, truncated segments, oversize messages and
//! failed allocations all degrade to dropping the one message in flight,
//! never to corrupting the instance.

pub mod assembly;
pub mod chunk;
pub mod extension;
pub mod ffi;
pub mod transport;
pub mod wire;

pub use assembly::{AssemblyStore, IncomingMessage, PeerState};
pub use chunk::chunk_message;
pub use extension::{Callbacks, MessagesExtension, SendError};
pub use transport::{FriendId, PacketList, Transport};
pub use wire::{DecodeError, Packet, ReceiptId};

use uuid::Uuid;

/// Transport-level identity this extension registers under. Fixed so
/// independent implementations of the same protocol find each other.
pub const EXTENSION_UUID: Uuid = Uuid::from_bytes([
    0x9e, 0x10, 0x03, 0x16, 0xd2, 0x6f, 0x45, 0x39, 0x8c, 0xdb, 0xae, 0x81, 0x00, 0x42, 0xf8, 0x64,
]);
