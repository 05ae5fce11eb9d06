//! Chunker: split one outbound message into transport-sized wire
//! segments.

use crate::transport::PacketList;
use crate::wire::{self, Packet, ReceiptId};

/// Split `data` into wire segments of at most `segment_limit` bytes and
/// queue them on `packet` in order, so the transport flushes them as one
/// batch.
///
/// A message that fits in one segment goes out as a bare FINISH, no
/// START; this mirrors the single-segment path on the receive side.
/// Larger messages go out as START, zero or more PART, then FINISH.
/// Every segment before the last fills `segment_limit` exactly where the
/// remaining bytes allow it.
///
/// `segment_limit` must exceed the FINISH header size; the transport's
/// limit is far above it in practice.
pub fn chunk_message(
    packet: &mut PacketList,
    data: &[u8],
    receipt_id: ReceiptId,
    segment_limit: usize,
) {
    debug_assert!(segment_limit > wire::FINISH_HEADER_SIZE);
    let finish_room = segment_limit - wire::FINISH_HEADER_SIZE;
    if data.len() <= finish_room {
        packet.append_segment(wire::encode(&Packet::Finish { receipt_id, data }));
        return;
    }

    let (first, mut rest) = data.split_at(segment_limit - wire::START_HEADER_SIZE);
    packet.append_segment(wire::encode(&Packet::Start {
        total_size: data.len() as u64,
        data: first,
    }));

    let part_room = segment_limit - wire::PART_HEADER_SIZE;
    while rest.len() > finish_room {
        let take = part_room.min(rest.len());
        let (mid, tail) = rest.split_at(take);
        packet.append_segment(wire::encode(&Packet::Part { data: mid }));
        rest = tail;
    }

    packet.append_segment(wire::encode(&Packet::Finish {
        receipt_id,
        data: rest,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{decode, FINISH_HEADER_SIZE};

    const LIMIT: usize = 64;

    fn chunks(data: &[u8]) -> Vec<Vec<u8>> {
        let mut packet = PacketList::new();
        chunk_message(&mut packet, data, ReceiptId(42), LIMIT);
        packet.into_segments()
    }

    fn kinds(segments: &[Vec<u8>]) -> Vec<u8> {
        segments.iter().map(|s| s[0]).collect()
    }

    #[test]
    fn empty_message_is_one_empty_finish() {
        let segments = chunks(&[]);
        assert_eq!(segments.len(), 1);
        assert_eq!(
            decode(&segments[0]).unwrap(),
            Packet::Finish {
                receipt_id: ReceiptId(42),
                data: &[],
            }
        );
    }

    #[test]
    fn exact_fit_is_one_finish() {
        let data = vec![7u8; LIMIT - FINISH_HEADER_SIZE];
        let segments = chunks(&data);
        assert_eq!(kinds(&segments), vec![3]);
        assert_eq!(segments[0].len(), LIMIT);
    }

    #[test]
    fn one_byte_over_is_start_plus_finish() {
        let data = vec![7u8; LIMIT - FINISH_HEADER_SIZE + 1];
        let segments = chunks(&data);
        assert_eq!(kinds(&segments), vec![1, 3]);
        assert_eq!(segments[0].len(), LIMIT);
    }

    #[test]
    fn twice_the_limit_needs_a_part() {
        let data = vec![7u8; 2 * LIMIT];
        let segments = chunks(&data);
        assert_eq!(kinds(&segments), vec![1, 2, 3]);
    }

    #[test]
    fn intermediate_segments_fill_the_limit() {
        let data = vec![7u8; 5 * LIMIT + 3];
        let segments = chunks(&data);
        for segment in &segments[..segments.len() - 1] {
            assert_eq!(segment.len(), LIMIT);
        }
        assert!(segments.last().unwrap().len() <= LIMIT);
    }

    #[test]
    fn start_declares_full_length_and_bytes_survive() {
        let data: Vec<u8> = (0..500u32).map(|i| i as u8).collect();
        let segments = chunks(&data);
        let mut rebuilt = Vec::new();
        for (i, segment) in segments.iter().enumerate() {
            assert!(segment.len() <= LIMIT);
            match decode(segment).unwrap() {
                Packet::Start {
                    total_size,
                    data: chunk,
                } => {
                    assert_eq!(i, 0);
                    assert_eq!(total_size, 500);
                    rebuilt.extend_from_slice(chunk);
                }
                Packet::Part { data: chunk } => rebuilt.extend_from_slice(chunk),
                Packet::Finish {
                    receipt_id,
                    data: chunk,
                } => {
                    assert_eq!(i, segments.len() - 1);
                    assert_eq!(receipt_id, ReceiptId(42));
                    rebuilt.extend_from_slice(chunk);
                }
                other => panic!("unexpected packet {other:?}"),
            }
        }
        assert_eq!(rebuilt, data);
    }

    #[test]
    fn minimum_viable_limit() {
        // Limit of header + 1: every chunk carries at least one byte.
        let data = vec![9u8; 25];
        let mut packet = PacketList::new();
        chunk_message(&mut packet, &data, ReceiptId(0), FINISH_HEADER_SIZE + 1);
        let segments = packet.into_segments();
        let total: usize = segments
            .iter()
            .map(|s| match decode(s).unwrap() {
                Packet::Start { data, .. } | Packet::Part { data } | Packet::Finish { data, .. } => {
                    data.len()
                }
                other => panic!("unexpected packet {other:?}"),
            })
            .sum();
        assert_eq!(total, 25);
    }
}
