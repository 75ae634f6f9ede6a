//! Packed arrays of GF(16) bytes
//!
//! One element per byte, eight elements per 64-bit word. The kernels here are
//! word-at-a-time: a scalar multiplier is applied to eight elements per step
//! by accumulating shifted plane copies inside the word and folding the
//! overflow bits with x^4 = x + 1. Because every element is at most 0x0F, a
//! left shift by three keeps each partial product inside its own byte, so no
//! cross-byte masking is needed before reduction.
//!
//! These routines back the dense coefficient matrices ([`crate::gfm`]) and
//! the null-vector extraction buffer; the bit-sliced blocks in
//! [`crate::grp`] are the transposed cousins used by the Lanczos kernels.

#![forbid(unsafe_code)]

use crate::{gf16, Gf16};

const LO_NIBBLES: u64 = 0x0F0F_0F0F_0F0F_0F0F;
const BIT6: u64 = 0x4040_4040_4040_4040;
const BIT5: u64 = 0x2020_2020_2020_2020;
const BIT4: u64 = 0x1010_1010_1010_1010;

/// Multiply eight packed elements by a scalar in one word.
#[inline(always)]
fn mul_word(w: u64, c: Gf16) -> u64 {
    debug_assert_eq!(w & !LO_NIBBLES, 0);
    let c = c as u64;
    let mut p = 0u64;
    p ^= w & (c & 0x1).wrapping_neg();
    p ^= (w << 1) & ((c >> 1) & 0x1).wrapping_neg();
    p ^= (w << 2) & ((c >> 2) & 0x1).wrapping_neg();
    p ^= (w << 3) & ((c >> 3) & 0x1).wrapping_neg();
    // Reduction by x^4 + x + 1, highest overflow bit first.
    let t6 = p & BIT6;
    p ^= t6 ^ (t6 >> 3) ^ (t6 >> 4);
    let t5 = p & BIT5;
    p ^= t5 ^ (t5 >> 3) ^ (t5 >> 4);
    let t4 = p & BIT4;
    p ^= t4 ^ (t4 >> 3) ^ (t4 >> 4);
    p
}

#[inline(always)]
fn load(chunk: &[u8]) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(chunk);
    u64::from_le_bytes(b)
}

#[inline(always)]
fn store(chunk: &mut [u8], w: u64) {
    chunk.copy_from_slice(&w.to_le_bytes());
}

/// Clamp every byte into `0..=15` in place. Used after bulk random fills.
pub fn reduc_in_place(a: &mut [u8]) {
    let mut chunks = a.chunks_exact_mut(8);
    for ch in &mut chunks {
        store(ch, load(ch) & LO_NIBBLES);
    }
    for v in chunks.into_remainder() {
        *v = gf16::reduc(*v);
    }
}

/// `a[i] *= c` for every element.
pub fn mul_scalar_in_place(a: &mut [u8], c: Gf16) {
    let mut chunks = a.chunks_exact_mut(8);
    for ch in &mut chunks {
        store(ch, mul_word(load(ch), c));
    }
    for v in chunks.into_remainder() {
        *v = gf16::mul(*v, c);
    }
}

/// Fused multiply-add: `a[i] += b[i] * c`. Subtraction is the same operation
/// in characteristic two.
pub fn fma_scalar(a: &mut [u8], b: &[u8], c: Gf16) {
    debug_assert_eq!(a.len(), b.len());
    let mut ac = a.chunks_exact_mut(8);
    let mut bc = b.chunks_exact(8);
    for (av, bv) in (&mut ac).zip(&mut bc) {
        store(av, load(av) ^ mul_word(load(bv), c));
    }
    for (av, bv) in ac.into_remainder().iter_mut().zip(bc.remainder()) {
        *av ^= gf16::mul(*bv, c);
    }
}

/// Masked fused multiply-add over at most 64 elements: element `i` of `a` is
/// updated only when bit `i` of `d` is set.
pub fn fma_scalar_mask64(a: &mut [u8], b: &[u8], c: Gf16, d: u64) {
    debug_assert_eq!(a.len(), b.len());
    debug_assert!(a.len() <= 64);
    let tail_base = (a.len() / 8) * 8;
    let mut ac = a.chunks_exact_mut(8);
    let mut bc = b.chunks_exact(8);
    for (ci, (av, bv)) in (&mut ac).zip(&mut bc).enumerate() {
        let m = spread8((d >> (ci * 8)) as u8);
        store(av, load(av) ^ (mul_word(load(bv), c) & m));
    }
    for (i, (av, bv)) in ac
        .into_remainder()
        .iter_mut()
        .zip(bc.remainder())
        .enumerate()
    {
        if (d >> (tail_base + i)) & 0x1 != 0 {
            *av ^= gf16::mul(*bv, c);
        }
    }
}

/// Keep element `i` only where bit `i` of `d` is set, zero the rest.
pub fn zero_by_mask64(a: &mut [u8], d: u64) {
    debug_assert!(a.len() <= 64);
    let tail_base = (a.len() / 8) * 8;
    let mut chunks = a.chunks_exact_mut(8);
    for (ci, ch) in (&mut chunks).enumerate() {
        let m = spread8((d >> (ci * 8)) as u8);
        store(ch, load(ch) & m);
    }
    for (i, v) in chunks.into_remainder().iter_mut().enumerate() {
        if (d >> (tail_base + i)) & 0x1 == 0 {
            *v = 0;
        }
    }
}

/// Expand eight mask bits into eight mask bytes.
#[inline(always)]
fn spread8(bits: u8) -> u64 {
    let mut m = 0u64;
    let mut i = 0;
    while i < 8 {
        m |= (((bits >> i) & 0x1) as u64).wrapping_neg() & (0xFFu64 << (i * 8));
        i += 1;
    }
    m
}

/// Number of zero elements.
pub fn count_zeros(a: &[u8]) -> usize {
    a.iter().filter(|&&v| v == 0).count()
}

/// Number of nonzero elements.
#[inline]
pub fn count_nonzeros(a: &[u8]) -> usize {
    a.len() - count_zeros(a)
}
