//! Dense row-major GF(16) matrices
//!
//! One byte per element over a packed array, used for the instance
//! coefficient matrices and for the assembled Kipnis-Shamir base system.
//! These matrices sit outside the hot loop; the only performance-relevant
//! query is `max_tnum_per_eq`, which sizes the Macaulay storage estimate.

#![forbid(unsafe_code)]

use crate::{gfa, Gf16};
use rand::Rng;

/// Dense `nrow x ncol` matrix of GF(16) bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gfm {
    nrow: usize,
    ncol: usize,
    data: Vec<u8>,
}

impl Gfm {
    /// Zero matrix of the given shape.
    pub fn new(nrow: usize, ncol: usize) -> Self {
        debug_assert!(nrow > 0 && ncol > 0);
        Self {
            nrow,
            ncol,
            data: vec![0; nrow * ncol],
        }
    }

    /// Build from row-major values; every value must already be in `0..=15`.
    pub fn from_values(nrow: usize, ncol: usize, vals: &[Gf16]) -> Self {
        debug_assert_eq!(vals.len(), nrow * ncol);
        debug_assert!(vals.iter().all(|&v| v <= 15));
        Self {
            nrow,
            ncol,
            data: vals.to_vec(),
        }
    }

    #[inline]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    #[inline]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    pub fn zero(&mut self) {
        self.data.fill(0);
    }

    /// Uniform random coefficients.
    pub fn rand(&mut self, rng: &mut impl Rng) {
        rng.fill(self.data.as_mut_slice());
        gfa::reduc_in_place(&mut self.data);
    }

    #[inline]
    pub fn row(&self, ri: usize) -> &[u8] {
        &self.data[ri * self.ncol..(ri + 1) * self.ncol]
    }

    #[inline]
    pub fn row_mut(&mut self, ri: usize) -> &mut [u8] {
        &mut self.data[ri * self.ncol..(ri + 1) * self.ncol]
    }

    pub fn row_copy_from(&mut self, ri: usize, row: &[u8]) {
        debug_assert_eq!(row.len(), self.ncol);
        self.row_mut(ri).copy_from_slice(row);
    }

    #[inline]
    pub fn at(&self, ri: usize, ci: usize) -> Gf16 {
        self.data[ri * self.ncol + ci]
    }

    #[inline]
    pub fn set_at(&mut self, ri: usize, ci: usize, v: Gf16) {
        debug_assert!(v <= 15);
        self.data[ri * self.ncol + ci] = v;
    }

    /// Number of zero coefficients.
    pub fn count_zeros(&self) -> usize {
        gfa::count_zeros(&self.data)
    }

    /// Number of nonzero coefficients.
    pub fn count_nonzeros(&self) -> usize {
        gfa::count_nonzeros(&self.data)
    }

    /// Largest number of nonzero terms in any row.
    pub fn max_tnum_per_eq(&self) -> usize {
        (0..self.nrow)
            .map(|ri| gfa::count_nonzeros(self.row(ri)))
            .max()
            .unwrap_or(0)
    }
}
