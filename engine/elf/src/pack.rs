//! Byte-order and word-packing primitives.
//!
//! The MMDSP target is word-addressed and big-endian: code is a stream of
//! 64-bit big-endian words, 24-bit data banks pack three bytes per word
//! on disk, and 16-bit banks carry one pad byte per data byte. The host
//! is byte-addressed and may be either endianness, so every conversion
//! here goes through explicit `from_be`/`to_be` forms rather than
//! assuming a layout.
//!
//! None of these routines can fail; they operate on caller-validated
//! ranges only.

/// Target half-word (16-bit) to host order.
#[inline]
pub fn swap_half(value: u16) -> u16 {
    u16::from_be(value)
}

/// Target word (32-bit) to host order.
#[inline]
pub fn swap_word(value: u32) -> u32 {
    u32::from_be(value)
}

/// Target extended word (64-bit) to host order.
#[inline]
pub fn swap_xword(value: u64) -> u64 {
    u64::from_be(value)
}

/// Copy a stream of 64-bit big-endian code words into host words.
///
/// `src.len()` must be a multiple of 8 and `dst` exactly as long.
pub fn copy_code64(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(src.len() % 8, 0);
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.chunks_exact_mut(8).zip(src.chunks_exact(8)) {
        let word = u64::from_be_bytes(s.try_into().unwrap());
        d.copy_from_slice(&word.to_ne_bytes());
    }
}

/// Re-encode host 64-bit words back to the big-endian code stream.
pub fn pack_code64(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(src.len() % 8, 0);
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.chunks_exact_mut(8).zip(src.chunks_exact(8)) {
        let word = u64::from_ne_bytes(s.try_into().unwrap());
        d.copy_from_slice(&word.to_be_bytes());
    }
}

/// Expand packed 24-bit words (three big-endian bytes each) into host
/// 32-bit words.
///
/// `src.len()` must be a multiple of 3 and `dst.len()` equal to
/// `src.len() / 3 * 4`.
pub fn unpack24(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(src.len() % 3, 0);
    debug_assert_eq!(dst.len(), src.len() / 3 * 4);
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
        let word = ((s[0] as u32) << 16) | ((s[1] as u32) << 8) | s[2] as u32;
        d.copy_from_slice(&word.to_ne_bytes());
    }
}

/// Re-pack host 32-bit words into the 24-bit on-disk form. The top byte
/// of each word is discarded.
pub fn pack24(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(src.len() % 4, 0);
    debug_assert_eq!(dst.len(), src.len() / 4 * 3);
    for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(4)) {
        let word = u32::from_ne_bytes(s.try_into().unwrap());
        d[0] = (word >> 16) as u8;
        d[1] = (word >> 8) as u8;
        d[2] = word as u8;
    }
}

/// Expand 16-bit words from their padded on-disk form. Each word occupies
/// four file bytes; the odd bytes are pad and are skipped, the even bytes
/// form one big-endian half-word.
///
/// `src.len()` must be a multiple of 4 and `dst.len()` equal to
/// `src.len() / 2`.
pub fn unpack16(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(src.len() % 4, 0);
    debug_assert_eq!(dst.len(), src.len() / 2);
    for (d, s) in dst.chunks_exact_mut(2).zip(src.chunks_exact(4)) {
        let half = ((s[0] as u16) << 8) | s[2] as u16;
        d.copy_from_slice(&half.to_ne_bytes());
    }
}

/// Re-pack host 16-bit words into the padded on-disk form, with zero
/// pads.
pub fn pack16(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(src.len() % 2, 0);
    debug_assert_eq!(dst.len(), src.len() * 2);
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(2)) {
        let half = u16::from_ne_bytes(s.try_into().unwrap());
        d[0] = (half >> 8) as u8;
        d[1] = 0;
        d[2] = half as u8;
        d[3] = 0;
    }
}

/// Burst copy into a target-memory window.
///
/// Models the memory-mapped write path to DSP memory: the bulk of the
/// range goes out as 64-bit accesses, with narrower (8/16/32-bit)
/// accesses covering an unaligned head and tail. Never reads or writes
/// outside the declared range.
pub fn burst_copy(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    let mut n = dst.len();
    let mut d = dst.as_mut_ptr();
    let mut s = src.as_ptr();
    // SAFETY: `d` and `s` walk two equal-length slices in step; every
    // access below is bounds-checked against `n` before advancing.
    unsafe {
        if n >= 1 && d as usize & 1 != 0 {
            d.write_volatile(s.read());
            d = d.add(1);
            s = s.add(1);
            n -= 1;
        }
        while n >= 2 && d as usize & 7 != 0 {
            (d as *mut u16).write_volatile((s as *const u16).read_unaligned());
            d = d.add(2);
            s = s.add(2);
            n -= 2;
        }
        while n >= 8 {
            (d as *mut u64).write_volatile((s as *const u64).read_unaligned());
            d = d.add(8);
            s = s.add(8);
            n -= 8;
        }
        if n >= 4 {
            (d as *mut u32).write_volatile((s as *const u32).read_unaligned());
            d = d.add(4);
            s = s.add(4);
            n -= 4;
        }
        if n >= 2 {
            (d as *mut u16).write_volatile((s as *const u16).read_unaligned());
            d = d.add(2);
            s = s.add(2);
            n -= 2;
        }
        if n == 1 {
            d.write_volatile(s.read());
        }
    }
}

/// Burst zero of a target-memory window; same access-width policy as
/// [`burst_copy`].
pub fn burst_zero(dst: &mut [u8]) {
    let mut n = dst.len();
    let mut d = dst.as_mut_ptr();
    // SAFETY: every access is bounds-checked against `n` before `d`
    // advances; `d` never leaves the slice.
    unsafe {
        if n >= 1 && d as usize & 1 != 0 {
            d.write_volatile(0);
            d = d.add(1);
            n -= 1;
        }
        while n >= 2 && d as usize & 7 != 0 {
            (d as *mut u16).write_volatile(0);
            d = d.add(2);
            n -= 2;
        }
        while n >= 8 {
            (d as *mut u64).write_volatile(0);
            d = d.add(8);
            n -= 8;
        }
        if n >= 4 {
            (d as *mut u32).write_volatile(0);
            d = d.add(4);
            n -= 4;
        }
        if n >= 2 {
            (d as *mut u16).write_volatile(0);
            d = d.add(2);
            n -= 2;
        }
        if n == 1 {
            d.write_volatile(0);
        }
    }
}
