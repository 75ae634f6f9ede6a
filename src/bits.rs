//! Fixed-width bit lanes
//!
//! A lane is a logical block of N bits (N in {64, 128, 256, 512}) stored as
//! 64-bit limbs, with the bitwise vocabulary the sliced GF(16) kernels need:
//! AND/OR/XOR/ANDN, negation, popcount, counting trailing zeros, single-bit
//! access, `mix` (masked blend), and set-bit enumeration. The [`Lane`] trait
//! is the seam the block types are generic over; `u64` implements it
//! directly and the wider lanes are limb arrays.
//!
//! The 512-bit lane carries 64-byte alignment; the block containers in
//! [`crate::grp`] re-impose that alignment on their whole storage, which is
//! the invariant the sliced kernels rely on.

#![forbid(unsafe_code)]

use rand::Rng;

/// Extend the least significant bit of `b` across a full word:
/// `1 -> u64::MAX`, `0 -> 0`. The scalar-broadcast trick behind every
/// branch-free plane select.
#[inline(always)]
pub fn extend_from_lsb(b: u64) -> u64 {
    (b & 0x1).wrapping_neg()
}

/// Lowest set bit of `a` as a one-hot word (0 when `a` is 0).
#[inline(always)]
pub fn lsb(a: u64) -> u64 {
    a & a.wrapping_neg()
}

/// Clear the lowest set bit.
#[inline(always)]
pub fn clear_lsb(a: u64) -> u64 {
    a & a.wrapping_sub(1)
}

/// Iterator over the set-bit positions of a word, ascending.
#[derive(Clone, Copy, Debug)]
pub struct SetBits64(pub u64);

impl Iterator for SetBits64 {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let i = self.0.trailing_zeros();
        self.0 = clear_lsb(self.0);
        Some(i)
    }
}

/// A fixed-width block of bits with the operations the sliced kernels use.
///
/// Implementations must keep all limbs beyond the logical width at zero;
/// every operation here preserves that.
pub trait Lane: Copy + Eq {
    /// Logical width in bits.
    const BITS: usize;

    /// All-zero lane.
    fn zero() -> Self;
    /// All-one lane.
    fn ones() -> Self;
    /// Broadcast one word across every limb.
    fn splat(v: u64) -> Self;
    /// Fill from the process RNG.
    fn rand(rng: &mut impl Rng) -> Self;

    fn and(self, o: Self) -> Self;
    fn or(self, o: Self) -> Self;
    fn xor(self, o: Self) -> Self;
    /// `!self & o`.
    fn andn(self, o: Self) -> Self;
    fn not(self) -> Self;

    fn is_zero(self) -> bool;
    fn popcount(self) -> u32;
    /// Trailing zeros; `BITS` when the lane is zero.
    fn ctz(self) -> u32;

    /// Bit `i` as 0 or 1.
    fn bit(self, i: usize) -> u64;
    fn set_bit(&mut self, i: usize, v: u64);
    fn toggle_bit(&mut self, i: usize);

    /// `(a & m) | (b & !m)`.
    #[inline]
    fn mix(a: Self, b: Self, m: Self) -> Self {
        a.and(m).or(m.andn(b))
    }

    /// Append the positions of all set bits, ascending.
    fn push_set_bits(self, out: &mut Vec<u32>);
}

impl Lane for u64 {
    const BITS: usize = 64;

    #[inline(always)]
    fn zero() -> Self {
        0
    }
    #[inline(always)]
    fn ones() -> Self {
        u64::MAX
    }
    #[inline(always)]
    fn splat(v: u64) -> Self {
        v
    }
    #[inline]
    fn rand(rng: &mut impl Rng) -> Self {
        rng.gen()
    }

    #[inline(always)]
    fn and(self, o: Self) -> Self {
        self & o
    }
    #[inline(always)]
    fn or(self, o: Self) -> Self {
        self | o
    }
    #[inline(always)]
    fn xor(self, o: Self) -> Self {
        self ^ o
    }
    #[inline(always)]
    fn andn(self, o: Self) -> Self {
        !self & o
    }
    #[inline(always)]
    fn not(self) -> Self {
        !self
    }

    #[inline(always)]
    fn is_zero(self) -> bool {
        self == 0
    }
    #[inline(always)]
    fn popcount(self) -> u32 {
        self.count_ones()
    }
    #[inline(always)]
    fn ctz(self) -> u32 {
        self.trailing_zeros()
    }

    #[inline(always)]
    fn bit(self, i: usize) -> u64 {
        debug_assert!(i < 64);
        (self >> i) & 0x1
    }
    #[inline(always)]
    fn set_bit(&mut self, i: usize, v: u64) {
        debug_assert!(i < 64 && v <= 1);
        *self = (*self & !(0x1 << i)) | (v << i);
    }
    #[inline(always)]
    fn toggle_bit(&mut self, i: usize) {
        debug_assert!(i < 64);
        *self ^= 0x1 << i;
    }

    #[inline]
    fn push_set_bits(self, out: &mut Vec<u32>) {
        out.extend(SetBits64(self));
    }
}

macro_rules! wide_lane {
    ($(#[$attr:meta])* $name:ident, $limbs:expr) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct $name(pub [u64; $limbs]);

        impl Lane for $name {
            const BITS: usize = $limbs * 64;

            #[inline(always)]
            fn zero() -> Self {
                Self([0; $limbs])
            }
            #[inline(always)]
            fn ones() -> Self {
                Self([u64::MAX; $limbs])
            }
            #[inline(always)]
            fn splat(v: u64) -> Self {
                Self([v; $limbs])
            }
            #[inline]
            fn rand(rng: &mut impl Rng) -> Self {
                let mut s = [0u64; $limbs];
                for l in s.iter_mut() {
                    *l = rng.gen();
                }
                Self(s)
            }

            #[inline(always)]
            fn and(self, o: Self) -> Self {
                let mut s = self.0;
                for i in 0..$limbs {
                    s[i] &= o.0[i];
                }
                Self(s)
            }
            #[inline(always)]
            fn or(self, o: Self) -> Self {
                let mut s = self.0;
                for i in 0..$limbs {
                    s[i] |= o.0[i];
                }
                Self(s)
            }
            #[inline(always)]
            fn xor(self, o: Self) -> Self {
                let mut s = self.0;
                for i in 0..$limbs {
                    s[i] ^= o.0[i];
                }
                Self(s)
            }
            #[inline(always)]
            fn andn(self, o: Self) -> Self {
                let mut s = [0u64; $limbs];
                for i in 0..$limbs {
                    s[i] = !self.0[i] & o.0[i];
                }
                Self(s)
            }
            #[inline(always)]
            fn not(self) -> Self {
                let mut s = self.0;
                for l in s.iter_mut() {
                    *l = !*l;
                }
                Self(s)
            }

            #[inline]
            fn is_zero(self) -> bool {
                self.0.iter().all(|&l| l == 0)
            }
            #[inline]
            fn popcount(self) -> u32 {
                self.0.iter().map(|l| l.count_ones()).sum()
            }
            #[inline]
            fn ctz(self) -> u32 {
                for (i, &l) in self.0.iter().enumerate() {
                    if l != 0 {
                        return i as u32 * 64 + l.trailing_zeros();
                    }
                }
                Self::BITS as u32
            }

            #[inline(always)]
            fn bit(self, i: usize) -> u64 {
                debug_assert!(i < Self::BITS);
                (self.0[i / 64] >> (i % 64)) & 0x1
            }
            #[inline(always)]
            fn set_bit(&mut self, i: usize, v: u64) {
                debug_assert!(i < Self::BITS && v <= 1);
                let l = &mut self.0[i / 64];
                *l = (*l & !(0x1 << (i % 64))) | (v << (i % 64));
            }
            #[inline(always)]
            fn toggle_bit(&mut self, i: usize) {
                debug_assert!(i < Self::BITS);
                self.0[i / 64] ^= 0x1 << (i % 64);
            }

            #[inline]
            fn push_set_bits(self, out: &mut Vec<u32>) {
                for (li, &l) in self.0.iter().enumerate() {
                    for b in SetBits64(l) {
                        out.push(li as u32 * 64 + b);
                    }
                }
            }
        }
    };
}

wide_lane!(
    /// 128-bit lane, two limbs.
    #[repr(C, align(16))]
    Lane128,
    2
);
wide_lane!(
    /// 256-bit lane, four limbs.
    #[repr(C, align(32))]
    Lane256,
    4
);
wide_lane!(
    /// 512-bit lane, eight limbs, 64-byte aligned.
    #[repr(C, align(64))]
    Lane512,
    8
);
