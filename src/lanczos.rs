//! Block-Lanczos over GF(16)
//!
//! Searches for left-kernel vectors of a tall sparse matrix `A`
//! (`rnum x cidxs_sz`, rows far outnumbering the 64-wide block) by a
//! three-term block recurrence on `B = A * A^T`:
//!
//! 1. `p = A^T * v` (the only parallel step),
//! 2. `inner = p^T * p`, the 64 x 64 Gramian,
//! 3. Gauss-Jordan on `inner` yields the independent-column mask `di_w` and
//!    the partial inverse `w_inv`,
//! 4. `v_next = (A * p) * S + v * (I + w_inv * (uu * S + inner)) * S
//!    + v_prev * (w_inv_prev * inner) * S` with `uu` the Gramian of `A * p`
//!    and `S` the diagonal selector for `di_w`,
//! 5. columns outside `di_w` are carried from `v` unchanged (the mix
//!    contract), then the generation rotates.
//!
//! A column whose `p` image goes to zero is a converged left-kernel
//! candidate: it drops out of `di_w` (its Gramian column is zero), the
//! running `active` mask retires it for good, and the mix carries it
//! untouched to the final block. Retirement is monotonic. The iteration
//! stops when `v` is entirely zero, when no column can advance, or when the
//! rank budget is spent; the final `v` is the candidate block handed to the
//! null-vector pipeline.
//!
//! Everything here is allocated once in the argument bag and reused across
//! batches; the loop body allocates nothing.

#![forbid(unsafe_code)]

use crate::cmsm::{partition_cols, Cmsm};
use crate::rblock::RBlock64;
use crate::rcblock::RcBlock64;
use rand::Rng;
use std::mem;
use std::ops::Range;

/// Preallocated operands for one Block-Lanczos run.
pub struct BlkArgs {
    /// Current, previous, and next candidate blocks over the sampled rows.
    v: RBlock64,
    v_prev: RBlock64,
    v_next: RBlock64,
    /// `A^T * v` over the condensed columns, current and previous.
    p: RBlock64,
    p_prev: RBlock64,
    /// Gramian of `p` and of `A * p`.
    inner: RcBlock64,
    uu: RcBlock64,
    /// Row-space selector of the current and previous iteration.
    w_inv: RcBlock64,
    w_inv_prev: RcBlock64,
    /// Scratch for the recurrence coefficients.
    c: RcBlock64,
    d: RcBlock64,
    di_w: u64,
    di_w_prev: u64,
    /// Columns never retired so far; shrinks monotonically.
    active: u64,
    /// Contiguous column ranges, one per worker.
    col_ranges: Vec<Range<usize>>,
}

/// Iteration budget for one batch: one block of 64 per step of expected
/// rank.
#[inline]
pub fn iter_num(block_size: usize, expected_rank: u64) -> u64 {
    expected_rank.div_ceil(block_size as u64)
}

impl BlkArgs {
    pub fn new(rnum: usize, cidxs_sz: usize, tnum: usize) -> Self {
        Self {
            v: RBlock64::new(rnum),
            v_prev: RBlock64::new(rnum),
            v_next: RBlock64::new(rnum),
            p: RBlock64::new(cidxs_sz),
            p_prev: RBlock64::new(cidxs_sz),
            inner: RcBlock64::new(),
            uu: RcBlock64::new(),
            w_inv: RcBlock64::new(),
            w_inv_prev: RcBlock64::new(),
            c: RcBlock64::new(),
            d: RcBlock64::new(),
            di_w: 0,
            di_w_prev: 0,
            active: u64::MAX,
            col_ranges: partition_cols(cidxs_sz, tnum),
        }
    }

    /// The candidate block produced by the last run.
    #[inline]
    pub fn candidates(&self) -> &RBlock64 {
        &self.v
    }

    /// Column ranges of the worker fan-out; the verification pipeline reuses
    /// the same partition shape.
    #[inline]
    pub fn col_ranges(&self) -> &[Range<usize>] {
        &self.col_ranges
    }

    /// Selector of the last iteration and of the one before it.
    #[inline]
    pub fn di_w(&self) -> u64 {
        self.di_w
    }

    #[inline]
    pub fn di_w_prev(&self) -> u64 {
        self.di_w_prev
    }

    /// One full Block-Lanczos batch against the eliminate-side matrix.
    /// Returns the number of iterations executed.
    pub fn run(
        &mut self,
        a: &Cmsm,
        pool: &rayon::ThreadPool,
        rng: &mut impl Rng,
        budget: u64,
    ) -> u64 {
        debug_assert_eq!(a.rnum(), self.v.rnum());
        debug_assert_eq!(a.cidxs_sz(), self.p.rnum());

        // Start from a random block restricted to the image of A * A^T by
        // one bare application of the recurrence.
        self.v.rand(rng);
        a.tr_mul_parallel(&self.v, &mut self.p, &self.col_ranges, pool);
        self.v_next.zero();
        a.apply_acc(&self.p, &mut self.v_next);
        mem::swap(&mut self.v, &mut self.v_next);

        self.v_prev.zero();
        self.w_inv_prev.zero();
        self.di_w = 0;
        self.di_w_prev = 0;
        self.active = u64::MAX;

        let mut iters = 0u64;
        while iters < budget {
            if self.v.zero_col_positions() == u64::MAX {
                break; // v vanished, nothing left to advance
            }
            iters += 1;

            a.tr_mul_parallel(&self.v, &mut self.p, &self.col_ranges, pool);
            // Converged columns (zero image) retire for good.
            self.active &= !self.p.zero_col_positions();

            self.p.gramian(&mut self.inner);
            self.v_next.zero();
            a.apply_acc(&self.p, &mut self.v_next);
            self.v_next.gramian(&mut self.uu);

            self.c.copy_from(&self.inner);
            self.w_inv.identity();
            let di_raw = self.c.gj(&mut self.w_inv);
            let di_w = di_raw & self.active;
            self.di_w = di_w;
            if di_w == 0 {
                break; // no column can advance this round
            }
            // The selector only acts on the selected block; rows and columns
            // outside it carry elimination byproducts and must not leak into
            // the recurrence.
            self.w_inv.zero_cols(di_w);
            for j in crate::bits::SetBits64(!di_w) {
                self.w_inv.zero_row(j as usize);
            }

            // Coefficient of v: I + w_inv * (uu * S + inner).
            self.c.copy_from(&self.uu);
            self.c.zero_cols(di_w);
            self.c.add(&self.inner);
            RcBlock64::mul_naive(&mut self.d, &self.w_inv, &self.c);
            self.d.add_identity();
            // Coefficient of v_prev: w_inv_prev * inner.
            RcBlock64::mul_naive(&mut self.c, &self.w_inv_prev, &self.inner);

            // v_next = (A p) * S + v * D, then minus the history term; the
            // mix below restores the carried columns either way.
            self.v_next.diag_fma(&self.v, &self.d, di_w);
            self.v_next.fms_diag(&self.v_prev, &self.c, di_w);
            self.v_next.mix_i(&self.v, di_w);

            mem::swap(&mut self.v_prev, &mut self.v);
            mem::swap(&mut self.v, &mut self.v_next);
            mem::swap(&mut self.p_prev, &mut self.p);
            mem::swap(&mut self.w_inv_prev, &mut self.w_inv);
            self.di_w_prev = di_w;
        }
        iters
    }
}
