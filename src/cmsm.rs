//! Condensed column-major sparse Macaulay matrices
//!
//! A `Cmsm` is a column-subset of the Macaulay matrix under a row subsample:
//! per selected column, the (row, value) pairs that survive the sample,
//! packed contiguously in one arena with a per-column offset table. Row
//! indices within a column are strictly increasing and every stored value is
//! nonzero; both are construction invariants, checked in debug builds.
//!
//! The controller builds two of these from the same sample: the
//! eliminate-side (nonlinear columns) that Block-Lanczos grinds on, and the
//! keep-side (constant plus linear columns) that verifies candidates and
//! feeds the residual extraction. Sharing the sample makes a left-kernel
//! vector of one meaningful against the other.
//!
//! `tr_mul_*` computes `A^T * v` column-major (one output row per column);
//! the parallel variant fans contiguous column ranges out to the worker
//! pool, each worker owning a disjoint slice of the output rows. `apply_acc`
//! is the mirror product `out += A * p`, used by the recurrence and run on
//! the calling thread.

#![forbid(unsafe_code)]

use crate::bitmap::BitMap;
use crate::grp::GrpBlock64;
use crate::mdeg::MDegFilter;
use crate::mdmac::{MdMac, RowSample};
use crate::rblock::RBlock64;
use crate::Gf16;
use rayon::prelude::*;
use std::ops::Range;

/// Column-major condensed sparse matrix over GF(16).
pub struct Cmsm {
    rnum: usize,
    col_offsets: Vec<usize>,
    row_idxs: Vec<u32>,
    vals: Vec<Gf16>,
    col_midx: Vec<u64>,
    max_tnum: u64,
}

impl Cmsm {
    /// Condense the filtered columns of `mac` under `sample`.
    pub fn from_mdmac(mac: &MdMac, sample: &RowSample, filter: MDegFilter) -> Self {
        let col_midx: Vec<u64> = mac.cols_matching(filter).collect();
        // Membership map over the global columns; the local index of a
        // selected column is its rank, columns being gathered in order.
        let mut sel = BitMap::new(mac.ncol() as usize);
        for &m in &col_midx {
            sel.set_at(m as usize, true);
        }
        let mut ranks = Vec::with_capacity(mac.ncol() as usize);
        let mut r = 0u32;
        for m in 0..mac.ncol() as usize {
            debug_assert_eq!(r as u64, sel.popcount_upto(m));
            ranks.push(r);
            r += sel.at(m) as u32;
        }
        let local = |midx: u64| ranks[midx as usize] as usize;

        let mut counts = vec![0usize; col_midx.len()];
        for &q in sample.rows() {
            for &(ci, _) in mac.row(q) {
                if sel.at(ci as usize) {
                    counts[local(ci)] += 1;
                }
            }
        }
        let mut col_offsets = Vec::with_capacity(col_midx.len() + 1);
        let mut acc = 0usize;
        col_offsets.push(0);
        for &c in &counts {
            acc += c;
            col_offsets.push(acc);
        }

        let mut row_idxs = vec![0u32; acc];
        let mut vals = vec![0u8; acc];
        let mut cursor = col_offsets.clone();
        for (s, &q) in sample.rows().iter().enumerate() {
            for &(ci, v) in mac.row(q) {
                if sel.at(ci as usize) {
                    let loc = local(ci);
                    let at = cursor[loc];
                    row_idxs[at] = s as u32;
                    vals[at] = v;
                    cursor[loc] = at + 1;
                }
            }
        }
        let max_tnum = counts.iter().max().copied().unwrap_or(0) as u64;

        let out = Self {
            rnum: sample.len(),
            col_offsets,
            row_idxs,
            vals,
            col_midx,
            max_tnum,
        };
        out.debug_check();
        out
    }

    /// Build directly from per-column entry lists. Rows must be ascending
    /// within a column and values nonzero.
    pub fn from_columns(rnum: usize, cols: Vec<(u64, Vec<(u32, Gf16)>)>) -> Self {
        let mut col_offsets = Vec::with_capacity(cols.len() + 1);
        let mut row_idxs = Vec::new();
        let mut vals = Vec::new();
        let mut col_midx = Vec::with_capacity(cols.len());
        let mut max_tnum = 0u64;
        col_offsets.push(0);
        for (midx, entries) in cols {
            max_tnum = max_tnum.max(entries.len() as u64);
            for (ri, v) in entries {
                row_idxs.push(ri);
                vals.push(v);
            }
            col_offsets.push(row_idxs.len());
            col_midx.push(midx);
        }
        let out = Self {
            rnum,
            col_offsets,
            row_idxs,
            vals,
            col_midx,
            max_tnum,
        };
        out.debug_check();
        out
    }

    fn debug_check(&self) {
        #[cfg(debug_assertions)]
        for j in 0..self.cidxs_sz() {
            let (rows, vals) = self.col(j);
            debug_assert!(rows.windows(2).all(|w| w[0] < w[1]), "column {j} rows");
            debug_assert!(vals.iter().all(|&v| v != 0 && v <= 15), "column {j} vals");
            debug_assert!(rows.iter().all(|&r| (r as usize) < self.rnum));
        }
    }

    /// Number of sampled rows.
    #[inline]
    pub fn rnum(&self) -> usize {
        self.rnum
    }

    /// Number of selected columns.
    #[inline]
    pub fn cidxs_sz(&self) -> usize {
        self.col_midx.len()
    }

    /// Global Macaulay column index of local column `j`.
    #[inline]
    pub fn col_midx(&self, j: usize) -> u64 {
        self.col_midx[j]
    }

    /// Entries of local column `j`: ascending row indices and their values.
    #[inline]
    pub fn col(&self, j: usize) -> (&[u32], &[Gf16]) {
        let r = self.col_offsets[j]..self.col_offsets[j + 1];
        (&self.row_idxs[r.clone()], &self.vals[r])
    }

    /// Largest per-column entry count.
    #[inline]
    pub fn max_tnum(&self) -> u64 {
        self.max_tnum
    }

    /// Mean per-column entry count, rounded down.
    pub fn avg_tnum(&self) -> u64 {
        if self.col_midx.is_empty() {
            0
        } else {
            self.row_idxs.len() as u64 / self.col_midx.len() as u64
        }
    }

    /// Total stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.row_idxs.len()
    }

    /// Arena footprint in bytes, for the condensation report.
    pub fn mem_size(ncols: u64, nnz: u64) -> u64 {
        nnz * 5 + (ncols + 1) * 8 + ncols * 8
    }

    /// `out[j] = sum_i A[i, j] * v[i]` for the columns in `cols`; `out` is
    /// the matching slice of the destination rows.
    fn tr_mul_range(&self, v: &RBlock64, cols: Range<usize>, out: &mut [GrpBlock64]) {
        debug_assert_eq!(v.rnum(), self.rnum);
        debug_assert_eq!(cols.len(), out.len());
        for (dst, j) in out.iter_mut().zip(cols) {
            let (rows, vals) = self.col(j);
            let mut acc = GrpBlock64::new();
            for (&ri, &val) in rows.iter().zip(vals) {
                acc.fmadd_scalar(v.row(ri as usize), val);
            }
            *dst = acc;
        }
    }

    /// `p = A^T * v` on the calling thread.
    pub fn tr_mul(&self, v: &RBlock64, p: &mut RBlock64) {
        debug_assert_eq!(p.rnum(), self.cidxs_sz());
        self.tr_mul_range(v, 0..self.cidxs_sz(), p.rows_mut());
    }

    /// `p = A^T * v` fanned out over `ranges`; each worker writes its own
    /// disjoint slice of `p`, the pool join is the only barrier.
    pub fn tr_mul_parallel(
        &self,
        v: &RBlock64,
        p: &mut RBlock64,
        ranges: &[Range<usize>],
        pool: &rayon::ThreadPool,
    ) {
        debug_assert_eq!(p.rnum(), self.cidxs_sz());
        debug_assert_eq!(
            ranges.iter().map(|r| r.len()).sum::<usize>(),
            self.cidxs_sz()
        );
        let mut tasks: Vec<(Range<usize>, &mut [GrpBlock64])> = Vec::with_capacity(ranges.len());
        let mut rest = p.rows_mut();
        for r in ranges {
            let (head, tail) = rest.split_at_mut(r.len());
            tasks.push((r.clone(), head));
            rest = tail;
        }
        pool.install(|| {
            tasks
                .into_par_iter()
                .for_each(|(r, out)| self.tr_mul_range(v, r, out));
        });
    }

    /// `out += A * p`, sequential.
    pub fn apply_acc(&self, p: &RBlock64, out: &mut RBlock64) {
        debug_assert_eq!(p.rnum(), self.cidxs_sz());
        debug_assert_eq!(out.rnum(), self.rnum);
        for j in 0..self.cidxs_sz() {
            let prow = *p.row(j);
            if prow.is_zero() {
                continue;
            }
            let (rows, vals) = self.col(j);
            for (&ri, &val) in rows.iter().zip(vals) {
                out.row_mut(ri as usize).fmadd_scalar(&prow, val);
            }
        }
    }
}

/// Split `ncols` into `tnum` contiguous ranges of near-equal size. Empty
/// ranges are kept so the task list always matches the pool width.
pub fn partition_cols(ncols: usize, tnum: usize) -> Vec<Range<usize>> {
    debug_assert!(tnum > 0);
    let base = ncols / tnum;
    let extra = ncols % tnum;
    let mut out = Vec::with_capacity(tnum);
    let mut start = 0;
    for t in 0..tnum {
        let len = base + usize::from(t < extra);
        out.push(start..start + len);
        start += len;
    }
    out
}
