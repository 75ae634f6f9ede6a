//! The null-vector pipeline
//!
//! Takes the candidate block from Block-Lanczos and turns it into residual
//! rows: multiply against the keep-side matrix (parallel, same fan-out shape
//! as the eliminate-side product), classify the 64 columns by whether their
//! kept-side image is nonzero, then extract each surviving column as a dense
//! GF(16) vector over the remaining variables, fingerprint it with BLAKE2s,
//! and insert into the dedup set. A fresh digest writes the vector into the
//! residual containers; duplicates and full buckets are counted and dropped.
//!
//! Candidates are *assumed* to lie in the left kernel of the eliminate side,
//! since heuristically they do; the full check against the eliminate-side
//! matrix exists behind the `collect-stats` feature and in tests. A false
//! positive only costs a wasted residual row, which the final elimination
//! tolerates.
//!
//! Extraction reads `prod` through a precomputed variable-to-row map (the
//! inverse of `vmap` against the kept column order), so each coefficient is
//! one indexed load.

#![forbid(unsafe_code)]

use crate::cmsm::Cmsm;
use crate::hmap::{Insert, NullHashMap, DIGEST_SIZE};
use crate::rblock::RBlock64;
use crate::residual::Residual;
use blake2::digest::consts::U16;
use blake2::{Blake2s, Digest};
use std::ops::Range;
use tracing::trace;

type Blake2s128 = Blake2s<U16>;

/// Drop counters for one batch, kept under `collect-stats`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStats {
    pub full: u64,
    pub dup: u64,
    pub zero_nv: u64,
    pub invalid_nv: u64,
}

/// 16-byte BLAKE2s fingerprint of a packed GF(16) vector.
pub fn fingerprint(vec: &[u8]) -> [u8; DIGEST_SIZE] {
    let mut h = Blake2s128::new();
    h.update(vec);
    let out = h.finalize();
    let mut d = [0u8; DIGEST_SIZE];
    d.copy_from_slice(&out);
    d
}

/// Positions of candidate columns that really are left-null vectors of the
/// eliminate side: nonzero in `v`, zero image in `p = A^T v`.
pub fn verify_nullvec(
    p: &mut RBlock64,
    elim: &Cmsm,
    v: &RBlock64,
    ranges: &[Range<usize>],
    pool: &rayon::ThreadPool,
) -> u64 {
    elim.tr_mul_parallel(v, p, ranges, pool);
    p.zero_col_positions() & v.nonzero_col_positions()
}

/// Inverse of `vmap` against the kept column order: entry `j` is the row of
/// the kept-side product holding variable-column `vmap[j]`.
pub fn variable_row_map(kept: &Cmsm, vmap: &[u64]) -> Vec<usize> {
    let mut pos = std::collections::HashMap::with_capacity(kept.cidxs_sz());
    for i in 0..kept.cidxs_sz() {
        pos.insert(kept.col_midx(i), i);
    }
    vmap.iter().map(|midx| pos[midx]).collect()
}

/// Verify, extract, dedup, and store one batch of candidates. Returns the
/// number of fresh null vectors written into the residual.
#[allow(clippy::too_many_arguments)]
pub fn proc_nullvec(
    hmap: &mut NullHashMap,
    res: &mut Residual,
    prod: &mut RBlock64,
    v: &RBlock64,
    kept: &Cmsm,
    kept_ranges: &[Range<usize>],
    pool: &rayon::ThreadPool,
    var_rows: &[usize],
    vec_buf: &mut [u8],
    stats: &mut NullStats,
) -> u32 {
    let remaining_ncol = var_rows.len();
    debug_assert_eq!(vec_buf.len(), remaining_ncol);
    debug_assert!(remaining_ncol <= res.width());

    kept.tr_mul_parallel(v, prod, kept_ranges, pool);
    // A column whose kept-side image vanishes contributes nothing to the
    // residual; everything else is taken on faith as a left-null vector of
    // the eliminate side.
    let valid_nv_pos = prod.nonzero_col_positions();
    if valid_nv_pos == 0 {
        return 0;
    }

    let sc_size = res.width();
    let ori_count = hmap.len();
    for i in 0..64usize {
        if (valid_nv_pos >> i) & 0x1 == 0 {
            continue;
        }
        let dst_idx = hmap.len();
        if dst_idx >= sc_size {
            break; // enough null vectors collected
        }

        for (j, &row) in var_rows.iter().enumerate() {
            vec_buf[j] = prod.at(row, i);
        }
        let digest = fingerprint(vec_buf);
        match hmap.insert(&digest) {
            Insert::Success => {
                trace!(digest = %hex::encode(digest), dst_idx, "nullvector banked");
                res.set_sol(dst_idx, vec_buf[0]);
                for (k, &coef) in vec_buf.iter().enumerate().skip(1) {
                    res.set_mat(dst_idx, k - 1, coef);
                }
            }
            Insert::Duplicate => stats.dup += 1,
            Insert::BucketFull => stats.full += 1,
        }
    }

    (hmap.len() - ori_count) as u32
}
