//! C ABI for linking the extension as a static library from C/C++ hosts
//! that own the transport. The host forwards dispatch calls and flushes
//! the packet lists this layer fills.

use std::ffi::c_void;
use std::os::raw::c_int;
use std::slice;

use crate::extension::{Callbacks, MessagesExtension};
use crate::transport::{FriendId, PacketList, Transport};
use crate::wire::{ReceiptId, FINISH_HEADER_SIZE};

/// A whole message arrived from a friend. The bytes are valid only for
/// the duration of the call.
pub type BigmsgReceivedCb =
    Option<extern "C" fn(friend: u32, message: *const u8, length: usize, user_data: *mut c_void)>;
/// A friend acknowledged receipt of a previously sent message.
pub type BigmsgReceiptCb = Option<extern "C" fn(friend: u32, receipt_id: u64, user_data: *mut c_void)>;
/// Negotiation with a friend finished.
pub type BigmsgNegotiatedCb =
    Option<extern "C" fn(friend: u32, negotiated: bool, user_data: *mut c_void)>;
/// Ask the host transport to run its compatibility handshake.
pub type BigmsgNegotiateFn = Option<extern "C" fn(friend: u32, user_data: *mut c_void)>;

struct FfiTransport {
    max_segment_size: usize,
    negotiate_fn: BigmsgNegotiateFn,
    user_data: *mut c_void,
}

impl Transport for FfiTransport {
    fn max_segment_size(&self) -> usize {
        self.max_segment_size
    }

    fn negotiate(&mut self, friend: FriendId) {
        if let Some(negotiate) = self.negotiate_fn {
            negotiate(friend.0, self.user_data);
        }
    }
}

type FfiExtension = MessagesExtension<FfiTransport>;

/// Copy the 16-byte extension UUID into `out_buf` so the host can
/// register the extension under it. Returns 0, or -1 on a null/short
/// buffer.
#[no_mangle]
pub extern "C" fn bigmsg_extension_uuid(out_buf: *mut u8, out_len: usize) -> c_int {
    if out_buf.is_null() || out_len < 16 {
        return -1;
    }
    let bytes = crate::EXTENSION_UUID.into_bytes();
    unsafe {
        out_buf.copy_from_nonoverlapping(bytes.as_ptr(), bytes.len());
    }
    0
}

/// Create an extension instance. `max_segment_size` is the transport's
/// segment limit and must exceed the largest packet header (9 bytes);
/// `user_data` is passed back on every callback. Returns an opaque handle
/// or null on invalid arguments.
#[no_mangle]
pub extern "C" fn bigmsg_register(
    max_segment_size: usize,
    negotiate_fn: BigmsgNegotiateFn,
    received_cb: BigmsgReceivedCb,
    receipt_cb: BigmsgReceiptCb,
    negotiated_cb: BigmsgNegotiatedCb,
    user_data: *mut c_void,
    max_receive_size: u64,
) -> *mut c_void {
    if max_segment_size <= FINISH_HEADER_SIZE {
        return std::ptr::null_mut();
    }
    let transport = FfiTransport {
        max_segment_size,
        negotiate_fn,
        user_data,
    };
    let received_data = user_data;
    let receipt_data = user_data;
    let negotiated_data = user_data;
    let callbacks = Callbacks {
        received: Box::new(move |friend, bytes| {
            if let Some(cb) = received_cb {
                cb(friend.0, bytes.as_ptr(), bytes.len(), received_data);
            }
        }),
        receipt: Box::new(move |friend, id| {
            if let Some(cb) = receipt_cb {
                cb(friend.0, id.0, receipt_data);
            }
        }),
        negotiated: Box::new(move |friend, ok| {
            if let Some(cb) = negotiated_cb {
                cb(friend.0, ok, negotiated_data);
            }
        }),
    };
    let extension = MessagesExtension::register(transport, callbacks, max_receive_size);
    Box::into_raw(Box::new(extension)) as *mut c_void
}

/// Destroy an extension instance and every per-friend buffer it owns.
/// No-op if `h` is null.
#[no_mangle]
pub extern "C" fn bigmsg_free(h: *mut c_void) {
    if h.is_null() {
        return;
    }
    let _ = unsafe { Box::from_raw(h as *mut FfiExtension) };
}

/// Start negotiation with a friend (pass-through to the host transport).
#[no_mangle]
pub extern "C" fn bigmsg_negotiate(h: *mut c_void, friend: u32) -> c_int {
    if h.is_null() {
        return -1;
    }
    let extension = unsafe { &mut *(h as *mut FfiExtension) };
    extension.negotiate(FriendId(friend));
    0
}

/// Create an empty outgoing segment batch.
#[no_mangle]
pub extern "C" fn bigmsg_packet_list_new() -> *mut c_void {
    Box::into_raw(Box::new(PacketList::new())) as *mut c_void
}

/// Destroy a segment batch. No-op if `h` is null.
#[no_mangle]
pub extern "C" fn bigmsg_packet_list_free(h: *mut c_void) {
    if h.is_null() {
        return;
    }
    let _ = unsafe { Box::from_raw(h as *mut PacketList) };
}

/// Number of segments queued on the batch, or -1 if `h` is null.
#[no_mangle]
pub extern "C" fn bigmsg_packet_list_len(h: *mut c_void) -> c_int {
    if h.is_null() {
        return -1;
    }
    let list = unsafe { &*(h as *const PacketList) };
    list.len() as c_int
}

/// Copy segment `index` into `out_buf`. Returns bytes written, or -1 if
/// the index is out of range or the buffer too small. Flush segments in
/// index order as one batch.
#[no_mangle]
pub extern "C" fn bigmsg_packet_list_segment(
    h: *mut c_void,
    index: usize,
    out_buf: *mut u8,
    out_buf_len: usize,
) -> c_int {
    if h.is_null() || out_buf.is_null() {
        return -1;
    }
    let list = unsafe { &*(h as *const PacketList) };
    let Some(segment) = list.segments().get(index) else {
        return -1;
    };
    if segment.len() > out_buf_len {
        return -1;
    }
    unsafe {
        out_buf.copy_from_nonoverlapping(segment.as_ptr(), segment.len());
    }
    segment.len() as c_int
}

/// Queue `data` for `friend` on `list` as one run of wire segments.
/// Fills `out_receipt_id` on success. Returns 0 on success, -1 when the
/// friend is unnegotiated or the message exceeds its limit.
#[no_mangle]
pub extern "C" fn bigmsg_send(
    h: *mut c_void,
    list: *mut c_void,
    friend: u32,
    data: *const u8,
    length: usize,
    out_receipt_id: *mut u64,
) -> c_int {
    if h.is_null() || list.is_null() || (data.is_null() && length != 0) {
        return -1;
    }
    let extension = unsafe { &mut *(h as *mut FfiExtension) };
    let packet = unsafe { &mut *(list as *mut PacketList) };
    let bytes = if length == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(data, length) }
    };
    match extension.send(packet, FriendId(friend), bytes) {
        Ok(ReceiptId(id)) => {
            if !out_receipt_id.is_null() {
                unsafe {
                    *out_receipt_id = id;
                }
            }
            0
        }
        Err(_) => -1,
    }
}

/// Transport dispatch: one raw segment arrived from `friend`. Replies
/// are queued on `response`. Returns 0, or -1 on null arguments.
#[no_mangle]
pub extern "C" fn bigmsg_handle_segment(
    h: *mut c_void,
    friend: u32,
    data: *const u8,
    length: usize,
    response: *mut c_void,
) -> c_int {
    if h.is_null() || response.is_null() || (data.is_null() && length != 0) {
        return -1;
    }
    let extension = unsafe { &mut *(h as *mut FfiExtension) };
    let list = unsafe { &mut *(response as *mut PacketList) };
    let bytes = if length == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(data, length) }
    };
    extension.handle_segment(FriendId(friend), bytes, list);
    0
}

/// Transport dispatch: the compatibility handshake for `friend` finished.
/// Returns 0, or -1 on null arguments.
#[no_mangle]
pub extern "C" fn bigmsg_handle_negotiated(
    h: *mut c_void,
    friend: u32,
    compatible: bool,
    response: *mut c_void,
) -> c_int {
    if h.is_null() || response.is_null() {
        return -1;
    }
    let extension = unsafe { &mut *(h as *mut FfiExtension) };
    let list = unsafe { &mut *(response as *mut PacketList) };
    extension.handle_negotiated(FriendId(friend), compatible, list);
    0
}

/// The local receive limit the instance was created with.
#[no_mangle]
pub extern "C" fn bigmsg_max_receivable_size(h: *mut c_void) -> u64 {
    if h.is_null() {
        return 0;
    }
    let extension = unsafe { &*(h as *const FfiExtension) };
    extension.max_receivable_size()
}

/// The friend's negotiated receive limit. Fills `out_size` and returns 0,
/// or returns -1 if the friend never negotiated.
#[no_mangle]
pub extern "C" fn bigmsg_max_sendable_size(
    h: *mut c_void,
    friend: u32,
    out_size: *mut u64,
) -> c_int {
    if h.is_null() || out_size.is_null() {
        return -1;
    }
    let extension = unsafe { &*(h as *const FfiExtension) };
    match extension.max_sendable_size(FriendId(friend)) {
        Ok(size) => {
            unsafe {
                *out_size = size;
            }
            0
        }
        Err(_) => -1,
    }
}
