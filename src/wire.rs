//! Wire codec: fixed packet layouts, big-endian, one kind tag byte.

/// Delivery receipt id. Issued when a message is queued for sending and
/// echoed back by the receiving side once the whole message arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiptId(pub u64);

const TAG_NEGOTIATE: u8 = 0;
const TAG_START: u8 = 1;
const TAG_PART: u8 = 2;
const TAG_FINISH: u8 = 3;
const TAG_RECEIVED: u8 = 4;

/// Wire size of a START header: kind tag + 8-byte total message size.
pub const START_HEADER_SIZE: usize = 1 + 8;
/// Wire size of a PART header: kind tag only.
pub const PART_HEADER_SIZE: usize = 1;
/// Wire size of a FINISH header: kind tag + 8-byte receipt id.
pub const FINISH_HEADER_SIZE: usize = 1 + 8;

/// One decoded packet. Payload variants borrow the input segment; a
/// packet never outlives the dispatch that decoded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Size handshake: the sender accepts messages up to this many bytes.
    Negotiate { max_receive_size: u64 },
    /// First chunk of a multi-segment message; declares the full size.
    Start { total_size: u64, data: &'a [u8] },
    /// Middle chunk of a multi-segment message.
    Part { data: &'a [u8] },
    /// Final chunk; carries the receipt id to acknowledge with. The
    /// payload may be empty.
    Finish { receipt_id: ReceiptId, data: &'a [u8] },
    /// Acknowledgement that a whole message was reassembled. Terminal:
    /// never answered with anything.
    Received { receipt_id: ReceiptId },
}

/// Error decoding a segment (short input or an unassigned kind tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("segment truncated")]
    Truncated,
    #[error("unknown packet kind {0}")]
    UnknownKind(u8),
}

/// Decode one segment. Never reads past `segment`; trailing bytes after
/// the fixed fields of NEGOTIATE and RECEIVED are tolerated and ignored.
pub fn decode(segment: &[u8]) -> Result<Packet<'_>, DecodeError> {
    let (&tag, rest) = segment.split_first().ok_or(DecodeError::Truncated)?;
    match tag {
        TAG_NEGOTIATE => {
            let (size, _) = read_u64(rest)?;
            Ok(Packet::Negotiate {
                max_receive_size: size,
            })
        }
        TAG_START => {
            let (total, data) = read_u64(rest)?;
            Ok(Packet::Start {
                total_size: total,
                data,
            })
        }
        TAG_PART => Ok(Packet::Part { data: rest }),
        TAG_FINISH => {
            let (id, data) = read_u64(rest)?;
            Ok(Packet::Finish {
                receipt_id: ReceiptId(id),
                data,
            })
        }
        TAG_RECEIVED => {
            let (id, _) = read_u64(rest)?;
            Ok(Packet::Received {
                receipt_id: ReceiptId(id),
            })
        }
        other => Err(DecodeError::UnknownKind(other)),
    }
}

fn read_u64(buf: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    if buf.len() < 8 {
        return Err(DecodeError::Truncated);
    }
    let (head, rest) = buf.split_at(8);
    let mut raw = [0u8; 8];
    raw.copy_from_slice(head);
    Ok((u64::from_be_bytes(raw), rest))
}

/// Encode a packet into a fresh segment buffer. Exact inverse of
/// [`decode`]; sizing payloads to the transport limit is the chunker's
/// job, not the codec's.
pub fn encode(packet: &Packet<'_>) -> Vec<u8> {
    match *packet {
        Packet::Negotiate { max_receive_size } => {
            encode_header(TAG_NEGOTIATE, max_receive_size, &[])
        }
        Packet::Start { total_size, data } => encode_header(TAG_START, total_size, data),
        Packet::Part { data } => {
            let mut out = Vec::with_capacity(PART_HEADER_SIZE + data.len());
            out.push(TAG_PART);
            out.extend_from_slice(data);
            out
        }
        Packet::Finish { receipt_id, data } => encode_header(TAG_FINISH, receipt_id.0, data),
        Packet::Received { receipt_id } => encode_header(TAG_RECEIVED, receipt_id.0, &[]),
    }
}

fn encode_header(tag: u8, field: u64, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 8 + data.len());
    out.push(tag);
    out.extend_from_slice(&field.to_be_bytes());
    out.extend_from_slice(data);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_kinds() {
        let payload = b"hello".as_slice();
        let packets = [
            Packet::Negotiate {
                max_receive_size: 1 << 40,
            },
            Packet::Start {
                total_size: 12345,
                data: payload,
            },
            Packet::Part { data: payload },
            Packet::Finish {
                receipt_id: ReceiptId(7),
                data: payload,
            },
            Packet::Received {
                receipt_id: ReceiptId(u64::MAX),
            },
        ];
        for packet in &packets {
            let bytes = encode(packet);
            assert_eq!(decode(&bytes).unwrap(), *packet);
        }
    }

    #[test]
    fn big_endian_layout() {
        let bytes = encode(&Packet::Start {
            total_size: 0x0102030405060708,
            data: b"x",
        });
        assert_eq!(
            bytes,
            vec![1, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, b'x']
        );
    }

    #[test]
    fn empty_input_is_truncated() {
        assert_eq!(decode(&[]), Err(DecodeError::Truncated));
    }

    #[test]
    fn short_fixed_fields_are_truncated() {
        // Every 8-byte-field kind with only 7 field bytes.
        for tag in [0u8, 1, 3, 4] {
            let mut buf = vec![tag];
            buf.extend_from_slice(&[0; 7]);
            assert_eq!(decode(&buf), Err(DecodeError::Truncated), "tag {tag}");
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(decode(&[9, 0, 0]), Err(DecodeError::UnknownKind(9)));
    }

    #[test]
    fn part_payload_may_be_empty() {
        assert_eq!(decode(&[2]), Ok(Packet::Part { data: &[] }));
    }

    #[test]
    fn finish_payload_may_be_empty() {
        let bytes = encode(&Packet::Finish {
            receipt_id: ReceiptId(3),
            data: &[],
        });
        assert_eq!(bytes.len(), FINISH_HEADER_SIZE);
        assert_eq!(
            decode(&bytes),
            Ok(Packet::Finish {
                receipt_id: ReceiptId(3),
                data: &[],
            })
        );
    }

    #[test]
    fn trailing_bytes_tolerated_on_fixed_kinds() {
        let mut negotiate = encode(&Packet::Negotiate {
            max_receive_size: 10,
        });
        negotiate.extend_from_slice(b"junk");
        assert_eq!(
            decode(&negotiate),
            Ok(Packet::Negotiate {
                max_receive_size: 10,
            })
        );

        let mut received = encode(&Packet::Received {
            receipt_id: ReceiptId(10),
        });
        received.extend_from_slice(b"junk");
        assert_eq!(
            decode(&received),
            Ok(Packet::Received {
                receipt_id: ReceiptId(10),
            })
        );
    }

    #[test]
    fn payload_borrows_input() {
        let bytes = encode(&Packet::Part { data: b"abc" });
        match decode(&bytes).unwrap() {
            Packet::Part { data } => {
                assert!(std::ptr::eq(data.as_ptr(), bytes[1..].as_ptr()));
            }
            other => panic!("expected Part, got {other:?}"),
        }
    }
}
