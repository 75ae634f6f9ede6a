//! Multi-degree Macaulay assembly
//!
//! The amplifier: every KS base equation (bilinear, multi-degree
//! `e_j + e_lambda`) is multiplied by every monomial that keeps the product
//! under at least one target multi-degree. Monomials are canonical sorted
//! variable-index multisets; columns are ordered by (total degree, index
//! sequence), which puts the constant at column 0 and the degree-one
//! variables right after it, in variable order. The linear columns are
//! therefore a prefix, and the eliminate/keep split of the condensed
//! matrices is a filter over the column total degree.
//!
//! The column set is the union of realized product monomials, seeded with
//! the constant and every variable so the residual system always spans
//! `vnum + 1` kept columns even when a variable happens to vanish from the
//! instance.
//!
//! Row order is deterministic: kernel-vector blocks in order, multiplier
//! monomials in canonical order within the block, base rows in order. Row
//! subsampling is a seeded draw without replacement, sorted ascending, so
//! two condensed matrices built from the same sample share rows bit for bit.

#![forbid(unsafe_code)]

use crate::gfa;
use crate::gfm::Gfm;
use crate::mdeg::{MDeg, MDegFilter};
use crate::minrank::KsLayout;
use crate::Gf16;
use rand::{rngs::StdRng, SeedableRng};
use std::collections::{BTreeSet, HashMap};

/// A monomial: sorted variable indices, one entry per power.
pub type Monomial = Vec<u16>;

/// Merge-multiply two canonical monomials.
pub fn mono_mul(a: &Monomial, b: &Monomial) -> Monomial {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] <= b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Group-degree vector of a monomial under a KS layout: one slot per kernel
/// vector plus the lambda group at the end.
pub fn mono_group_degs(m: &Monomial, lay: &KsLayout) -> Vec<u8> {
    let mut d = vec![0u8; lay.c + 1];
    for &v in m {
        if (v as usize) < lay.k {
            d[lay.c] += 1;
        } else {
            d[(v as usize - lay.k) / lay.r] += 1;
        }
    }
    d
}

/// A seeded subsample of Macaulay rows, sorted ascending. Shared by the
/// eliminate-side and keep-side condensed matrices so their rows agree bit
/// for bit.
pub struct RowSample {
    idxs: Vec<usize>,
}

impl RowSample {
    /// Draw `count` of `total` rows without replacement; `count >= total`
    /// keeps every row.
    pub fn new(seed: u64, total: usize, count: usize) -> Self {
        let idxs = if count >= total {
            (0..total).collect()
        } else {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut v = rand::seq::index::sample(&mut rng, total, count).into_vec();
            v.sort_unstable();
            v
        };
        Self { idxs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.idxs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idxs.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[usize] {
        &self.idxs
    }
}

/// The assembled multi-degree Macaulay matrix, row-sparse.
pub struct MdMac {
    lay: KsLayout,
    cols: Vec<Monomial>,
    col_index: HashMap<Monomial, u64>,
    rows: Vec<Vec<(u64, Gf16)>>,
    num_lin: u64,
}

/// Sizing report for the `--dry` path: shape and a storage estimate without
/// materializing coefficients.
#[derive(Clone, Copy, Debug)]
pub struct MacSizing {
    pub nrow: u64,
    pub ncol: u64,
    pub nnz: u64,
    pub bytes: u64,
}

impl MdMac {
    /// Assemble from the KS base system under the target multi-degrees.
    pub fn from_ks(ks: &Gfm, lay: KsLayout, mdegs: &[MDeg]) -> Self {
        debug_assert_eq!(ks.nrow(), lay.base_nrow());
        debug_assert_eq!(ks.ncol(), lay.base_ncol());
        let base_monos: Vec<Monomial> = (0..lay.base_ncol())
            .map(|t| lay.base_col_vars(t))
            .collect();

        // Base columns that are nonzero somewhere in each block; products of
        // all-zero columns never materialize.
        let live_cols = block_live_cols(ks, &lay);
        let multipliers = block_multipliers(&lay, mdegs);

        // Pass 1: the column set.
        let vnum = lay.k + lay.c * lay.r;
        let mut col_set: BTreeSet<Monomial> = BTreeSet::new();
        col_set.insert(Vec::new());
        for v in 0..vnum {
            col_set.insert(vec![v as u16]);
        }
        for j in 0..lay.c {
            for mu in &multipliers[j] {
                for &t in &live_cols[j] {
                    col_set.insert(mono_mul(mu, &base_monos[t]));
                }
            }
        }
        let mut cols: Vec<Monomial> = col_set.into_iter().collect();
        cols.sort_by(|a, b| (a.len(), a.as_slice()).cmp(&(b.len(), b.as_slice())));
        let col_index: HashMap<Monomial, u64> = cols
            .iter()
            .enumerate()
            .map(|(i, m)| (m.clone(), i as u64))
            .collect();
        let num_lin = cols.iter().take_while(|m| m.len() <= 1).count() as u64;

        // Pass 2: the rows.
        let mut rows = Vec::new();
        for j in 0..lay.c {
            for mu in &multipliers[j] {
                for a in 0..lay.nrow {
                    let q = j * lay.nrow + a;
                    let eq = ks.row(q);
                    let mut row: Vec<(u64, Gf16)> = Vec::with_capacity(live_cols[j].len());
                    for &t in &live_cols[j] {
                        let v = eq[t];
                        if v != 0 {
                            row.push((col_index[&mono_mul(mu, &base_monos[t])], v));
                        }
                    }
                    row.sort_unstable_by_key(|&(ci, _)| ci);
                    rows.push(row);
                }
            }
        }

        Self {
            lay,
            cols,
            col_index,
            rows,
            num_lin,
        }
    }

    /// Shape-only pass for the `--dry` report.
    pub fn sizing(ks: &Gfm, lay: &KsLayout, mdegs: &[MDeg]) -> MacSizing {
        let base_monos: Vec<Monomial> = (0..lay.base_ncol())
            .map(|t| lay.base_col_vars(t))
            .collect();
        let live_cols = block_live_cols(ks, lay);
        let multipliers = block_multipliers(lay, mdegs);

        let vnum = lay.k + lay.c * lay.r;
        let mut col_set: BTreeSet<Monomial> = BTreeSet::new();
        col_set.insert(Vec::new());
        for v in 0..vnum {
            col_set.insert(vec![v as u16]);
        }
        let mut nrow = 0u64;
        let mut nnz = 0u64;
        for j in 0..lay.c {
            for mu in &multipliers[j] {
                for &t in &live_cols[j] {
                    col_set.insert(mono_mul(mu, &base_monos[t]));
                }
            }
            nrow += multipliers[j].len() as u64 * lay.nrow as u64;
            let block_nnz: u64 = (0..lay.nrow)
                .map(|a| gfa::count_nonzeros(ks.row(j * lay.nrow + a)) as u64)
                .sum();
            nnz += multipliers[j].len() as u64 * block_nnz;
        }
        let ncol = col_set.len() as u64;
        // Column index plus value per entry, plus the per-row table.
        let bytes = nnz * 9 + nrow * 24 + ncol * 16;
        MacSizing {
            nrow,
            ncol,
            nnz,
            bytes,
        }
    }

    #[inline]
    pub fn nrow(&self) -> u64 {
        self.rows.len() as u64
    }

    #[inline]
    pub fn ncol(&self) -> u64 {
        self.cols.len() as u64
    }

    /// Count of linear-or-constant columns; a prefix of the column order.
    #[inline]
    pub fn num_lincol(&self) -> u64 {
        self.num_lin
    }

    #[inline]
    pub fn num_nlcol(&self) -> u64 {
        self.ncol() - self.num_lin
    }

    #[inline]
    pub fn layout(&self) -> &KsLayout {
        &self.lay
    }

    #[inline]
    pub fn row(&self, q: usize) -> &[(u64, Gf16)] {
        &self.rows[q]
    }

    /// Macaulay column of the degree-one monomial of variable `v`.
    pub fn vidx_to_midx(&self, v: usize) -> u64 {
        self.col_index[&vec![v as u16]]
    }

    /// Total degree of a column monomial.
    #[inline]
    pub fn col_total_deg(&self, midx: u64) -> u32 {
        self.cols[midx as usize].len() as u32
    }

    /// Walk the global column indices that pass the filter, in column order.
    pub fn cols_matching(&self, filter: MDegFilter) -> impl Iterator<Item = u64> + '_ {
        self.cols
            .iter()
            .enumerate()
            .filter(move |(_, m)| filter.matches(m.len() as u32))
            .map(|(i, _)| i as u64)
    }

    /// Per-column nonzero counts over a row subsample, plus the total.
    pub fn nznum(&self, sample: &RowSample) -> (Vec<u64>, u64) {
        let mut counts = vec![0u64; self.cols.len()];
        let mut total = 0u64;
        for &q in sample.rows() {
            for &(ci, _) in &self.rows[q] {
                counts[ci as usize] += 1;
                total += 1;
            }
        }
        (counts, total)
    }
}

/// Base columns with a nonzero coefficient somewhere in each block.
fn block_live_cols(ks: &Gfm, lay: &KsLayout) -> Vec<Vec<usize>> {
    (0..lay.c)
        .map(|j| {
            (0..lay.base_ncol())
                .filter(|&t| (0..lay.nrow).any(|a| ks.at(j * lay.nrow + a, t) != 0))
                .collect()
        })
        .collect()
}

/// Deduplicated multiplier monomials per kernel-vector block, canonical
/// order.
fn block_multipliers(lay: &KsLayout, mdegs: &[MDeg]) -> Vec<Vec<Monomial>> {
    (0..lay.c)
        .map(|j| {
            let mut set: BTreeSet<Monomial> = BTreeSet::new();
            let base = MDeg::base_eq(lay.c, j);
            for d in mdegs {
                if let Some(rem) = d.checked_sub(&base) {
                    for m in monomials_under(lay, &rem) {
                        set.insert(m);
                    }
                }
            }
            set.into_iter().collect()
        })
        .collect()
}

/// Every monomial whose group degrees are componentwise at most `rem`.
/// Lambda variables first, then the kernel groups, so concatenation stays
/// sorted.
fn monomials_under(lay: &KsLayout, rem: &MDeg) -> Vec<Monomial> {
    let mut groups: Vec<(Vec<u16>, usize)> = Vec::with_capacity(lay.c + 1);
    let lambda_vars: Vec<u16> = (0..lay.k as u16).collect();
    groups.push((lambda_vars, rem.deg(lay.c) as usize));
    for g in 0..lay.c {
        let vars: Vec<u16> = (0..lay.r)
            .map(|l| (lay.k + g * lay.r + l) as u16)
            .collect();
        groups.push((vars, rem.deg(g) as usize));
    }

    let mut acc: Vec<Monomial> = vec![Vec::new()];
    for (vars, cap) in &groups {
        if *cap == 0 || vars.is_empty() {
            continue;
        }
        let mut opts = Vec::new();
        let mut prefix = Vec::new();
        push_multisets(vars, *cap, &mut prefix, &mut opts);
        let mut next = Vec::with_capacity(acc.len() * opts.len());
        for a in &acc {
            for o in &opts {
                let mut m = a.clone();
                m.extend_from_slice(o);
                next.push(m);
            }
        }
        acc = next;
    }
    acc
}

/// Nondecreasing index sequences of length at most `cap` over `vars`; each
/// call site gets the empty prefix included.
fn push_multisets(vars: &[u16], cap: usize, prefix: &mut Monomial, out: &mut Vec<Monomial>) {
    out.push(prefix.clone());
    if cap == 0 {
        return;
    }
    for i in 0..vars.len() {
        prefix.push(vars[i]);
        push_multisets(&vars[i..], cap - 1, prefix, out);
        prefix.pop();
    }
}
