//! Row-major block vectors of width 64
//!
//! An `RBlock64` is `rnum` sliced rows of 64 GF(16) elements: the shape of
//! every Block-Lanczos operand (`v` blocks over the sampled Macaulay rows,
//! `p` blocks over the condensed columns, the verification product over the
//! kept columns). All the three-term-recurrence arithmetic lives here:
//! Gramian into a 64 x 64 block, fused multiply-add against a square block,
//! the diagonal-masked variants, and the column mix that carries retired
//! columns through an iteration untouched.
//!
//! Multiplier scalars are read straight out of the sliced rows (`_bs`
//! kernels), so no row is ever unpacked to bytes on the hot path.

#![forbid(unsafe_code)]

use crate::grp::GrpBlock64;
use crate::rcblock::RcBlock64;
use crate::Gf16;
use rand::Rng;

/// `rnum` rows of 64 GF(16) elements.
#[derive(Clone)]
pub struct RBlock64 {
    rows: Vec<GrpBlock64>,
}

impl RBlock64 {
    /// Zeroed block with `rnum` rows.
    pub fn new(rnum: usize) -> Self {
        Self {
            rows: vec![GrpBlock64::new(); rnum],
        }
    }

    #[inline]
    pub fn rnum(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn row(&self, i: usize) -> &GrpBlock64 {
        &self.rows[i]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut GrpBlock64 {
        &mut self.rows[i]
    }

    /// Split the rows into disjoint mutable ranges; the parallel sparse
    /// product hands one slice to each worker.
    pub fn rows_mut(&mut self) -> &mut [GrpBlock64] {
        &mut self.rows
    }

    #[inline]
    pub fn at(&self, ri: usize, ci: usize) -> Gf16 {
        self.rows[ri].at(ci)
    }

    #[inline]
    pub fn set_at(&mut self, ri: usize, ci: usize, v: Gf16) {
        self.rows[ri].set_at(ci, v);
    }

    pub fn zero(&mut self) {
        for r in self.rows.iter_mut() {
            r.zero();
        }
    }

    pub fn rand(&mut self, rng: &mut impl Rng) {
        for r in self.rows.iter_mut() {
            r.rand(rng);
        }
    }

    pub fn copy_from(&mut self, src: &Self) {
        debug_assert_eq!(self.rnum(), src.rnum());
        self.rows.copy_from_slice(&src.rows);
    }

    pub fn row_copy_from(&mut self, i: usize, row: &GrpBlock64) {
        self.rows[i].copy_from(row);
    }

    /// `out = self^T * self`, the 64 x 64 Gramian.
    pub fn gramian(&self, out: &mut RcBlock64) {
        out.zero();
        for row in &self.rows {
            let nz = row.nonzero_positions();
            for i in crate::bits::SetBits64(nz) {
                out.row_mut(i as usize)
                    .fmadd_scalar_bs(row, row, i as usize);
            }
        }
    }

    /// `self += b * c` where `c` is 64 x 64.
    pub fn fma(&mut self, b: &Self, c: &RcBlock64) {
        debug_assert_eq!(self.rnum(), b.rnum());
        for (dst, brow) in self.rows.iter_mut().zip(&b.rows) {
            let nz = brow.nonzero_positions();
            for j in crate::bits::SetBits64(nz) {
                dst.fmadd_scalar_bs(c.row(j as usize), brow, j as usize);
            }
        }
    }

    /// `self -= b * c`; identical to [`Self::fma`] in characteristic two.
    #[inline]
    pub fn fms(&mut self, b: &Self, c: &RcBlock64) {
        self.fma(b, c);
    }

    /// `self += b * c * D` with `D` the 0/1 diagonal encoded in `d`.
    pub fn fma_diag(&mut self, b: &Self, c: &RcBlock64, d: u64) {
        debug_assert_eq!(self.rnum(), b.rnum());
        for (dst, brow) in self.rows.iter_mut().zip(&b.rows) {
            let nz = brow.nonzero_positions();
            for j in crate::bits::SetBits64(nz) {
                dst.fmadd_scalar_mask_bs(c.row(j as usize), brow, j as usize, d);
            }
        }
    }

    /// `self = self * D + b * c`.
    pub fn diag_fma(&mut self, b: &Self, c: &RcBlock64, d: u64) {
        debug_assert_eq!(self.rnum(), b.rnum());
        for (dst, brow) in self.rows.iter_mut().zip(&b.rows) {
            dst.zero_subset(d);
            let nz = brow.nonzero_positions();
            for j in crate::bits::SetBits64(nz) {
                dst.fmadd_scalar_bs(c.row(j as usize), brow, j as usize);
            }
        }
    }

    /// `self -= b * c * D`; identical to [`Self::fma_diag`] in
    /// characteristic two.
    #[inline]
    pub fn fms_diag(&mut self, b: &Self, c: &RcBlock64, d: u64) {
        self.fma_diag(b, c, d);
    }

    pub fn zero_col(&mut self, ci: usize) {
        for r in self.rows.iter_mut() {
            r.zero_at(ci);
        }
    }

    /// Keep columns whose bit in `keep` is set, zero the rest.
    pub fn zero_cols(&mut self, keep: u64) {
        for r in self.rows.iter_mut() {
            r.zero_subset(keep);
        }
    }

    /// Mask of columns that are entirely zero.
    pub fn zero_col_positions(&self) -> u64 {
        let mut zp = u64::MAX;
        for r in &self.rows {
            zp &= r.zero_positions();
            if zp == 0 {
                break;
            }
        }
        zp
    }

    /// Mask of columns with at least one nonzero element.
    #[inline]
    pub fn nonzero_col_positions(&self) -> u64 {
        !self.zero_col_positions()
    }

    /// Number of rows that are entirely zero.
    pub fn zero_row_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_zero()).count()
    }

    /// Keep columns of `self` where `keep` has a set bit, take the column of
    /// `b` elsewhere.
    pub fn mix_i(&mut self, b: &Self, keep: u64) {
        debug_assert_eq!(self.rnum(), b.rnum());
        for (dst, brow) in self.rows.iter_mut().zip(&b.rows) {
            dst.mix(brow, keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gf16;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_rblock(rng: &mut StdRng, rnum: usize) -> RBlock64 {
        let mut b = RBlock64::new(rnum);
        b.rand(rng);
        b
    }

    fn random_rc(rng: &mut StdRng) -> RcBlock64 {
        let mut c = RcBlock64::new();
        c.rand(rng);
        c
    }

    #[test]
    fn gramian_matches_the_definition_and_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(61);
        let m = random_rblock(&mut rng, 90);
        let mut g = RcBlock64::new();
        m.gramian(&mut g);
        assert!(g.is_symmetric());
        for i in 0..64 {
            for j in 0..64 {
                let mut want = 0u8;
                for ri in 0..90 {
                    want ^= gf16::mul(m.at(ri, i), m.at(ri, j));
                }
                assert_eq!(g.at(i, j), want, "({i},{j})");
            }
        }
    }

    #[test]
    fn fma_matches_naive_product() {
        let mut rng = StdRng::seed_from_u64(62);
        let b = random_rblock(&mut rng, 40);
        let c = random_rc(&mut rng);
        let mut a = random_rblock(&mut rng, 40);
        let before = a.clone();
        a.fma(&b, &c);
        for ri in 0..40 {
            for ci in 0..64 {
                let mut want = before.at(ri, ci);
                for t in 0..64 {
                    want ^= gf16::mul(b.at(ri, t), c.at(t, ci));
                }
                assert_eq!(a.at(ri, ci), want, "({ri},{ci})");
            }
        }
    }

    #[test]
    fn fms_undoes_fma() {
        // Subtraction is addition in characteristic two, so applying the
        // same product twice restores the accumulator exactly.
        let mut rng = StdRng::seed_from_u64(66);
        let b = random_rblock(&mut rng, 33);
        let c = random_rc(&mut rng);
        let orig = random_rblock(&mut rng, 33);
        let mut a = orig.clone();
        a.fma(&b, &c);
        a.fms(&b, &c);
        for ri in 0..33 {
            for ci in 0..64 {
                assert_eq!(a.at(ri, ci), orig.at(ri, ci), "({ri},{ci})");
            }
        }
    }

    #[test]
    fn diag_variants_mask_columns() {
        let mut rng = StdRng::seed_from_u64(63);
        let b = random_rblock(&mut rng, 25);
        let c = random_rc(&mut rng);
        let d: u64 = rng.gen::<u64>();

        let mut full = RBlock64::new(25);
        full.fma(&b, &c);

        let mut masked = RBlock64::new(25);
        masked.fma_diag(&b, &c, d);
        for ri in 0..25 {
            for ci in 0..64 {
                let want = if (d >> ci) & 1 == 1 { full.at(ri, ci) } else { 0 };
                assert_eq!(masked.at(ri, ci), want);
            }
        }

        // a*D + b*c keeps masked columns of a and adds the full product.
        let mut a = random_rblock(&mut rng, 25);
        let before = a.clone();
        a.diag_fma(&b, &c, d);
        for ri in 0..25 {
            for ci in 0..64 {
                let kept = if (d >> ci) & 1 == 1 { before.at(ri, ci) } else { 0 };
                assert_eq!(a.at(ri, ci), kept ^ full.at(ri, ci));
            }
        }
    }

    #[test]
    fn column_masks_and_counts() {
        let mut rng = StdRng::seed_from_u64(64);
        let mut m = random_rblock(&mut rng, 10);
        m.zero_cols(!0 ^ (1 << 7)); // clear column 7
        assert_eq!(m.zero_col_positions() & (1 << 7), 1 << 7);
        assert_eq!(m.nonzero_col_positions() & (1 << 7), 0);
        m.zero_col(0);
        assert!(m.zero_col_positions() & 1 == 1);

        let mut z = RBlock64::new(4);
        assert_eq!(z.zero_row_count(), 4);
        z.set_at(2, 11, 5);
        assert_eq!(z.zero_row_count(), 3);
    }

    #[test]
    fn mix_carries_unselected_columns() {
        let mut rng = StdRng::seed_from_u64(65);
        let a0 = random_rblock(&mut rng, 12);
        let b = random_rblock(&mut rng, 12);
        let keep: u64 = rng.gen();
        let mut a = a0.clone();
        a.mix_i(&b, keep);
        for ri in 0..12 {
            for ci in 0..64 {
                let want = if (keep >> ci) & 1 == 1 { a0.at(ri, ci) } else { b.at(ri, ci) };
                assert_eq!(a.at(ri, ci), want);
            }
        }
    }
}
