//! Segment:offset translation.
//!
//! These are protocol-level formulas: the firmware hands out and accepts addresses in exactly this
//! form, so they are kept as fixed shift/mask expressions. All inputs are truncated to the widths
//! noted on each function; nothing here can overflow.

/// Highest linear address reachable through a real-mode `seg:off` pair (`FFFF:FFFF`).
pub const MAX_REAL_ADDR: u32 = 0x0010_FFEF;

/// Linear address of `seg:off`, i.e. `seg * 16 + off`.
#[inline]
pub const fn real_addr(seg: u16, off: u16) -> u32 {
    ((seg as u32) << 4) + off as u32
}

/// Packs `seg:off` into a 32-bit far pointer (segment in the high word).
#[inline]
pub const fn far_ptr(seg: u16, off: u16) -> u32 {
    ((seg as u32) << 16) | off as u32
}

/// Decodes a packed far pointer into a linear address.
///
/// The high word is the segment and the low word the offset; the segment contributes
/// `(ptr & 0xFFFF_0000) >> 12`, which is `seg << 4` without unpacking it first.
#[inline]
pub const fn far_ptr_to_linear(ptr: u32) -> u32 {
    ((ptr & 0xFFFF_0000) >> 12) + (ptr & 0xFFFF)
}

/// Segment of the normalized `seg:off` form of `linear` (offset in `0..16`).
///
/// Only the low 20 bits of `linear` are representable; higher bits are truncated by the 16-bit
/// result.
#[inline]
pub const fn linear_to_segment(linear: u32) -> u16 {
    (linear >> 4) as u16
}

/// Offset of the normalized `seg:off` form of `linear`, always in `0..16`.
#[inline]
pub const fn linear_to_offset(linear: u32) -> u16 {
    (linear & 0xF) as u16
}

/// Normalized far pointer for `linear`. Same truncation as [`linear_to_segment`].
#[inline]
pub const fn linear_to_far_ptr(linear: u32) -> u32 {
    far_ptr(linear_to_segment(linear), linear_to_offset(linear))
}
