//! Bit-sliced blocks of GF(16) elements
//!
//! A `GrpBlock{N}` holds N field elements as four N-bit planes, least
//! significant bit first. Scalar multiplication is branch-free on data: the
//! four bits of the multiplier become four plane-wide masks (via
//! `extend_from_lsb`), the masked planes are accumulated into seven partial
//! planes, and the three overflow planes fold back under x^4 = x + 1. The
//! fused multiply-add variants reuse the same schedule and XOR into the
//! accumulator, so a repeated `fmadd` cancels itself (characteristic two).
//!
//! The `_bs` variants read the multiplier out of another sliced block at a
//! given element index, which is what the row-times-matrix kernels in
//! [`crate::rblock`] and [`crate::rcblock`] are built from.
//!
//! All planes of one block always have the same width and the storage is
//! 64-byte aligned.

#![forbid(unsafe_code)]

use crate::bits::{extend_from_lsb, Lane, Lane128, Lane256, Lane512};
use crate::Gf16;
use rand::Rng;

#[inline(always)]
fn scalar_masks<L: Lane>(c: Gf16) -> [L; 4] {
    debug_assert!(c <= 15);
    [
        L::splat(extend_from_lsb(c as u64)),
        L::splat(extend_from_lsb(c as u64 >> 1)),
        L::splat(extend_from_lsb(c as u64 >> 2)),
        L::splat(extend_from_lsb(c as u64 >> 3)),
    ]
}

/// The shared multiply schedule: four masked input planes expand to seven
/// partial planes, then the reduction folds planes 6, 5, 4 into 3..0.
#[inline(always)]
fn mul_planes<L: Lane>(p: &[L; 4], m: &[L; 4]) -> [L; 4] {
    let mut b0 = p[0].and(m[0]);
    let mut b1 = p[1].and(m[0]).xor(p[0].and(m[1]));
    let mut b2 = p[2].and(m[0]).xor(p[1].and(m[1])).xor(p[0].and(m[2]));
    let mut b3 = p[3]
        .and(m[0])
        .xor(p[2].and(m[1]))
        .xor(p[1].and(m[2]))
        .xor(p[0].and(m[3]));
    let b4 = p[3].and(m[1]).xor(p[2].and(m[2])).xor(p[1].and(m[3]));
    let b5 = p[3].and(m[2]).xor(p[2].and(m[3]));
    let b6 = p[3].and(m[3]);
    // x^6 -> x^3 + x^2, x^5 -> x^2 + x, x^4 -> x + 1
    b3 = b3.xor(b6);
    b2 = b2.xor(b6).xor(b5);
    b1 = b1.xor(b5).xor(b4);
    b0 = b0.xor(b4);
    [b0, b1, b2, b3]
}

macro_rules! grp_block {
    ($(#[$doc:meta])* $name:ident, $lane:ty, $n:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        #[repr(C, align(64))]
        pub struct $name {
            planes: [$lane; 4],
        }

        impl $name {
            /// Number of elements in the block.
            pub const LEN: usize = $n;

            /// All-zero block.
            pub const fn new() -> Self {
                Self {
                    planes: [<$lane as ZeroInit>::ZERO; 4],
                }
            }

            #[inline]
            pub fn zero(&mut self) {
                self.planes = [<$lane>::zero(); 4];
            }

            pub fn rand(&mut self, rng: &mut impl Rng) {
                for p in self.planes.iter_mut() {
                    *p = <$lane>::rand(rng);
                }
            }

            #[inline]
            pub fn copy_from(&mut self, src: &Self) {
                self.planes = src.planes;
            }

            /// Keep elements of `self` where `m` has a set bit, take the
            /// element of `b` elsewhere.
            #[inline]
            pub fn mix(&mut self, b: &Self, m: $lane) {
                for (a, bp) in self.planes.iter_mut().zip(&b.planes) {
                    *a = <$lane>::mix(*a, *bp, m);
                }
            }

            /// Zero the element at `i`.
            #[inline]
            pub fn zero_at(&mut self, i: usize) {
                debug_assert!(i < Self::LEN);
                let mut m = <$lane>::ones();
                m.toggle_bit(i);
                self.zero_subset(m);
            }

            /// Zero every element whose bit in `mask` is clear.
            #[inline]
            pub fn zero_subset(&mut self, mask: $lane) {
                for p in self.planes.iter_mut() {
                    *p = p.and(mask);
                }
            }

            #[inline]
            pub fn at(&self, i: usize) -> Gf16 {
                debug_assert!(i < Self::LEN);
                (self.planes[0].bit(i)
                    | (self.planes[1].bit(i) << 1)
                    | (self.planes[2].bit(i) << 2)
                    | (self.planes[3].bit(i) << 3)) as Gf16
            }

            #[inline]
            pub fn set_at(&mut self, i: usize, v: Gf16) {
                debug_assert!(i < Self::LEN && v <= 15);
                for (k, p) in self.planes.iter_mut().enumerate() {
                    p.set_bit(i, (v as u64 >> k) & 0x1);
                }
            }

            /// Add `v` to the element at `i`.
            #[inline]
            pub fn add_at(&mut self, i: usize, v: Gf16) {
                debug_assert!(i < Self::LEN && v <= 15);
                for (k, p) in self.planes.iter_mut().enumerate() {
                    if (v >> k) & 0x1 != 0 {
                        p.toggle_bit(i);
                    }
                }
            }

            /// Elementwise addition (XOR of all planes).
            #[inline]
            pub fn add(&mut self, b: &Self) {
                for (a, bp) in self.planes.iter_mut().zip(&b.planes) {
                    *a = a.xor(*bp);
                }
            }

            /// Same as [`Self::add`] in characteristic two.
            #[inline]
            pub fn sub(&mut self, b: &Self) {
                self.add(b);
            }

            /// `self * c` into a fresh block.
            #[inline]
            pub fn mul_scalar(&self, c: Gf16) -> Self {
                Self {
                    planes: mul_planes(&self.planes, &scalar_masks(c)),
                }
            }

            /// `self *= c` in place.
            #[inline]
            pub fn mul_scalar_i(&mut self, c: Gf16) {
                self.planes = mul_planes(&self.planes, &scalar_masks(c));
            }

            /// `self += b * c`.
            #[inline]
            pub fn fmadd_scalar(&mut self, b: &Self, c: Gf16) {
                let prod = mul_planes(&b.planes, &scalar_masks(c));
                for (a, pr) in self.planes.iter_mut().zip(&prod) {
                    *a = a.xor(*pr);
                }
            }

            /// `self += b * g[i]`: the multiplier is read out of another
            /// sliced block without unpacking it.
            #[inline]
            pub fn fmadd_scalar_bs(&mut self, b: &Self, g: &Self, i: usize) {
                debug_assert!(i < Self::LEN);
                let m = [
                    <$lane>::splat(extend_from_lsb(g.planes[0].bit(i))),
                    <$lane>::splat(extend_from_lsb(g.planes[1].bit(i))),
                    <$lane>::splat(extend_from_lsb(g.planes[2].bit(i))),
                    <$lane>::splat(extend_from_lsb(g.planes[3].bit(i))),
                ];
                let prod = mul_planes(&b.planes, &m);
                for (a, pr) in self.planes.iter_mut().zip(&prod) {
                    *a = a.xor(*pr);
                }
            }

            /// `self += b * c`, applied only at elements whose bit in `d` is
            /// set.
            #[inline]
            pub fn fmadd_scalar_mask(&mut self, b: &Self, c: Gf16, d: $lane) {
                let prod = mul_planes(&b.planes, &scalar_masks(c));
                for (a, pr) in self.planes.iter_mut().zip(&prod) {
                    *a = a.xor(pr.and(d));
                }
            }

            /// Masked variant of [`Self::fmadd_scalar_bs`].
            #[inline]
            pub fn fmadd_scalar_mask_bs(&mut self, b: &Self, g: &Self, i: usize, d: $lane) {
                debug_assert!(i < Self::LEN);
                let m = [
                    <$lane>::splat(extend_from_lsb(g.planes[0].bit(i))),
                    <$lane>::splat(extend_from_lsb(g.planes[1].bit(i))),
                    <$lane>::splat(extend_from_lsb(g.planes[2].bit(i))),
                    <$lane>::splat(extend_from_lsb(g.planes[3].bit(i))),
                ];
                let prod = mul_planes(&b.planes, &m);
                for (a, pr) in self.planes.iter_mut().zip(&prod) {
                    *a = a.xor(pr.and(d));
                }
            }

            /// Mask of elements that are nonzero.
            #[inline]
            pub fn nonzero_positions(&self) -> $lane {
                self.planes[0]
                    .or(self.planes[1])
                    .or(self.planes[2].or(self.planes[3]))
            }

            /// Mask of elements that are zero.
            #[inline]
            pub fn zero_positions(&self) -> $lane {
                self.nonzero_positions().not()
            }

            #[inline]
            pub fn is_zero(&self) -> bool {
                self.nonzero_positions().is_zero()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

/// Const-init helper so the blocks can offer a `const fn new`.
trait ZeroInit {
    const ZERO: Self;
}
impl ZeroInit for u64 {
    const ZERO: Self = 0;
}
impl ZeroInit for Lane128 {
    const ZERO: Self = Lane128([0; 2]);
}
impl ZeroInit for Lane256 {
    const ZERO: Self = Lane256([0; 4]);
}
impl ZeroInit for Lane512 {
    const ZERO: Self = Lane512([0; 8]);
}

grp_block!(
    /// 64 GF(16) elements in four 64-bit planes.
    GrpBlock64,
    u64,
    64
);
grp_block!(
    /// 128 GF(16) elements in four 128-bit planes.
    GrpBlock128,
    Lane128,
    128
);
grp_block!(
    /// 256 GF(16) elements in four 256-bit planes.
    GrpBlock256,
    Lane256,
    256
);
grp_block!(
    /// 512 GF(16) elements in four 512-bit planes.
    GrpBlock512,
    Lane512,
    512
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gf16;
    use rand::{rngs::StdRng, SeedableRng};

    macro_rules! block_suite {
        ($mod_name:ident, $ty:ident, $lane:ty) => {
            mod $mod_name {
                use super::*;

                fn random_block(rng: &mut StdRng) -> $ty {
                    let mut b = $ty::new();
                    b.rand(rng);
                    b
                }

                #[test]
                fn set_at_roundtrip() {
                    let mut b = $ty::new();
                    for i in 0..$ty::LEN {
                        let v = ((i * 7 + 3) % 16) as Gf16;
                        b.set_at(i, v);
                        assert_eq!(b.at(i), v);
                    }
                    for i in 0..$ty::LEN {
                        assert_eq!(b.at(i), ((i * 7 + 3) % 16) as Gf16);
                    }
                }

                #[test]
                fn positions_partition_the_block() {
                    let mut rng = StdRng::seed_from_u64(41);
                    let b = random_block(&mut rng);
                    let nz = b.nonzero_positions();
                    let z = b.zero_positions();
                    assert_eq!(nz.or(z), <$lane>::ones());
                    assert!(nz.and(z).is_zero());
                    for i in 0..$ty::LEN {
                        assert_eq!(nz.bit(i) == 1, b.at(i) != 0);
                    }
                }

                #[test]
                fn mul_scalar_matches_field() {
                    let mut rng = StdRng::seed_from_u64(42);
                    let b = random_block(&mut rng);
                    for c in 0..16u8 {
                        let p = b.mul_scalar(c);
                        for i in 0..$ty::LEN {
                            assert_eq!(p.at(i), gf16::mul(b.at(i), c), "i={i} c={c}");
                        }
                    }
                }

                #[test]
                fn fmadd_twice_cancels() {
                    let mut rng = StdRng::seed_from_u64(43);
                    let orig = random_block(&mut rng);
                    let b = random_block(&mut rng);
                    let mut a = orig;
                    a.fmadd_scalar(&b, 11);
                    a.fmadd_scalar(&b, 11);
                    assert_eq!(a, orig);
                }

                #[test]
                fn bs_reads_the_right_multiplier() {
                    let mut rng = StdRng::seed_from_u64(44);
                    let b = random_block(&mut rng);
                    let g = random_block(&mut rng);
                    for i in [0, 1, $ty::LEN / 2, $ty::LEN - 1] {
                        let mut x = $ty::new();
                        x.fmadd_scalar_bs(&b, &g, i);
                        let want = b.mul_scalar(g.at(i));
                        assert_eq!(x, want);
                    }
                }

                #[test]
                fn masked_fmadd_and_mix() {
                    let mut rng = StdRng::seed_from_u64(45);
                    let orig = random_block(&mut rng);
                    let b = random_block(&mut rng);
                    let d = <$lane>::rand(&mut rng);
                    let mut a = orig;
                    a.fmadd_scalar_mask(&b, 5, d);
                    for i in 0..$ty::LEN {
                        if d.bit(i) == 1 {
                            assert_eq!(a.at(i), orig.at(i) ^ gf16::mul(b.at(i), 5));
                        } else {
                            assert_eq!(a.at(i), orig.at(i));
                        }
                    }
                    let mut m = orig;
                    m.mix(&b, d);
                    for i in 0..$ty::LEN {
                        let want = if d.bit(i) == 1 { orig.at(i) } else { b.at(i) };
                        assert_eq!(m.at(i), want);
                    }
                }

                #[test]
                fn zero_subset_and_add_at() {
                    let mut rng = StdRng::seed_from_u64(46);
                    let mut b = random_block(&mut rng);
                    let keep = <$lane>::rand(&mut rng);
                    let before = b;
                    b.zero_subset(keep);
                    for i in 0..$ty::LEN {
                        if keep.bit(i) == 1 {
                            assert_eq!(b.at(i), before.at(i));
                        } else {
                            assert_eq!(b.at(i), 0);
                        }
                    }
                    b.zero_at(0);
                    assert_eq!(b.at(0), 0);
                    b.add_at(0, 9);
                    b.add_at(0, 3);
                    assert_eq!(b.at(0), 9 ^ 3);
                }
            }
        };
    }

    block_suite!(w64, GrpBlock64, u64);
    block_suite!(w128, GrpBlock128, Lane128);
    block_suite!(w256, GrpBlock256, Lane256);
    block_suite!(w512, GrpBlock512, Lane512);
}
