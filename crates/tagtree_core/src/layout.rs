//! Index record geometry.
//!
//! An index record for sequence number `s` is laid out as `height(s)` back
//! pointers (16 bytes each, level 0 first), the i64 payload offset, the i32
//! sequence number, and the i64 tag. The trailing `seq` + `tag` pair is the
//! record's header suffix; back pointers and the reader's tail seek both
//! address that position.

/// Size of one back pointer: i64 tag + i64 index offset.
pub(crate) const BACK_POINTER_LEN: u64 = 16;

/// Size of the header suffix: i32 seq + i64 tag.
pub(crate) const HEADER_SUFFIX_LEN: u64 = 12;

/// Levels carried by the writer's back-pointer state. `update_height` of an
/// i32 sequence number never exceeds this.
pub(crate) const MAX_LEVELS: usize = 32;

/// Number of back pointers stored by the record with sequence number `seq`.
///
/// One more than the number of trailing zero bits of `seq`, decremented for
/// an exact power of two: the first record of a given level has no earlier
/// record of that level to point at, so the topmost pointer would always be
/// NIL and is not written. `height(1) == 0`.
pub(crate) fn height(seq: u32) -> usize {
    debug_assert!(seq > 0);
    let h = seq.trailing_zeros() as usize + 1;
    if seq.is_power_of_two() {
        h - 1
    } else {
        h
    }
}

/// Number of levels of the writer's back-pointer state refreshed after the
/// record with sequence number `seq` is written.
///
/// The undecremented variant of [`height`]: a power-of-two record stores one
/// pointer fewer than the levels it participates in, but later records at
/// its top level still need to find it.
pub(crate) fn update_height(seq: u32) -> usize {
    debug_assert!(seq > 0);
    seq.trailing_zeros() as usize + 1
}

/// Total on-disk size of the record with sequence number `seq`.
pub(crate) fn record_len(seq: u32) -> u64 {
    height(seq) as u64 * BACK_POINTER_LEN + 8 + HEADER_SUFFIX_LEN
}
