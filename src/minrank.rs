//! MinRank instances and the Kipnis-Shamir base system
//!
//! A MinRank instance asks for `lambda` with
//! `rank(M0 + sum lambda_i * Ms_i) <= r`. The KS encoding picks `c` kernel
//! vectors in systematic form: vector `j` is the unit vector `e_j` plus an
//! unknown combination `x(j, 0..r)` of the last `r` coordinates. Forcing
//! `M(lambda) * v_j = 0` yields `c * nrow` equations that are bilinear in
//! the `lambda` and `x` variables; collected over the fixed base-monomial
//! order they form the KS matrix, the seed of the Macaulay amplification.
//!
//! Base-monomial column order: constant, `lambda_0..lambda_{k-1}`,
//! `x(0,0)..x(c-1,r-1)`, then the products `lambda_i * x(j,l)` grouped by
//! `i`. Variables are numbered `0..k` for `lambda` and `k + j*r + l` for
//! `x(j, l)`, so the degree-one columns `1..=vnum` are the variables in
//! order.

#![forbid(unsafe_code)]

use crate::gfm::Gfm;
use rand::Rng;

/// A loaded MinRank instance.
pub struct MinRank {
    nrow: usize,
    ncol: usize,
    k: usize,
    r: usize,
    m0: Gfm,
    ms: Vec<Gfm>,
}

impl MinRank {
    pub fn new(nrow: usize, ncol: usize, k: usize, r: usize, m0: Gfm, ms: Vec<Gfm>) -> Self {
        debug_assert_eq!(ms.len(), k);
        debug_assert!(m0.nrow() == nrow && m0.ncol() == ncol);
        debug_assert!(ms.iter().all(|m| m.nrow() == nrow && m.ncol() == ncol));
        Self {
            nrow,
            ncol,
            k,
            r,
            m0,
            ms,
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
    #[inline]
    pub fn nmat(&self) -> usize {
        self.k
    }
    #[inline]
    pub fn rank(&self) -> usize {
        self.r
    }
    #[inline]
    pub fn m0(&self) -> &Gfm {
        &self.m0
    }
    #[inline]
    pub fn ms(&self) -> &[Gfm] {
        &self.ms
    }

    /// Assemble the KS base system for `c` kernel vectors.
    pub fn ks(&self, c: usize) -> Gfm {
        let lay = KsLayout::new(self.k, self.r, c, self.nrow);
        let mut ks = Gfm::new(lay.base_nrow(), lay.base_ncol());
        let off = self.ncol - self.r;
        for j in 0..c {
            for a in 0..self.nrow {
                let q = j * self.nrow + a;
                ks.set_at(q, 0, self.m0.at(a, j));
                for i in 0..self.k {
                    ks.set_at(q, 1 + i, self.ms[i].at(a, j));
                }
                for l in 0..self.r {
                    ks.set_at(q, lay.x_col(j, l), self.m0.at(a, off + l));
                    for i in 0..self.k {
                        ks.set_at(q, lay.lambda_x_col(i, j, l), self.ms[i].at(a, off + l));
                    }
                }
            }
        }
        ks
    }
}

/// Uniformly random stand-in for the KS matrix, same shape as the real one.
pub fn ks_rand(k: usize, r: usize, c: usize, nrow: usize, rng: &mut impl Rng) -> Gfm {
    let lay = KsLayout::new(k, r, c, nrow);
    let mut ks = Gfm::new(lay.base_nrow(), lay.base_ncol());
    ks.rand(rng);
    ks
}

/// Total number of variables: `k` linear plus `c * r` kernel.
#[inline]
pub fn total_var_num(k: usize, r: usize, c: usize) -> usize {
    k + c * r
}

/// Map a kernel-variable index (`>= k`) to its `(j, l)` coordinates.
#[inline]
pub fn kernel_var_idx_to_2d(i: usize, k: usize, r: usize) -> (usize, usize) {
    debug_assert!(i >= k && r > 0);
    ((i - k) / r, (i - k) % r)
}

/// Shape and column layout of the KS base system.
#[derive(Clone, Copy, Debug)]
pub struct KsLayout {
    pub k: usize,
    pub r: usize,
    pub c: usize,
    pub nrow: usize,
}

impl KsLayout {
    pub fn new(k: usize, r: usize, c: usize, nrow: usize) -> Self {
        Self { k, r, c, nrow }
    }

    /// Number of base equations.
    #[inline]
    pub fn base_nrow(&self) -> usize {
        self.c * self.nrow
    }

    /// Number of base monomials.
    #[inline]
    pub fn base_ncol(&self) -> usize {
        1 + self.k + self.c * self.r + self.k * self.c * self.r
    }

    /// Kernel-vector block a base equation belongs to.
    #[inline]
    pub fn block_of_row(&self, q: usize) -> usize {
        q / self.nrow
    }

    /// Variable index of `x(j, l)`.
    #[inline]
    pub fn x_var(&self, j: usize, l: usize) -> usize {
        self.k + j * self.r + l
    }

    /// Column of the degree-one monomial `x(j, l)`.
    #[inline]
    pub fn x_col(&self, j: usize, l: usize) -> usize {
        1 + self.x_var(j, l)
    }

    /// Column of the product `lambda_i * x(j, l)`.
    #[inline]
    pub fn lambda_x_col(&self, i: usize, j: usize, l: usize) -> usize {
        1 + self.k + self.c * self.r + i * self.c * self.r + j * self.r + l
    }

    /// Variable indices of base column `t`: empty for the constant, one
    /// entry for a plain variable, two for a bilinear product.
    pub fn base_col_vars(&self, t: usize) -> Vec<u16> {
        debug_assert!(t < self.base_ncol());
        let vnum = self.k + self.c * self.r;
        if t == 0 {
            Vec::new()
        } else if t <= vnum {
            vec![(t - 1) as u16]
        } else {
            let rest = t - 1 - vnum;
            let i = rest / (self.c * self.r);
            let xoff = rest % (self.c * self.r);
            vec![i as u16, (self.k + xoff) as u16]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gf16;

    #[test]
    fn layout_round_trips() {
        let lay = KsLayout::new(3, 2, 2, 5);
        assert_eq!(lay.base_nrow(), 10);
        assert_eq!(lay.base_ncol(), 1 + 3 + 4 + 12);
        assert_eq!(lay.base_col_vars(0), Vec::<u16>::new());
        // Degree-one columns are the variables in order.
        for v in 0..total_var_num(3, 2, 2) {
            assert_eq!(lay.base_col_vars(1 + v), vec![v as u16]);
        }
        // Bilinear columns name the right pair.
        let t = lay.lambda_x_col(2, 1, 0);
        assert_eq!(lay.base_col_vars(t), vec![2u16, lay.x_var(1, 0) as u16]);
        assert_eq!(kernel_var_idx_to_2d(lay.x_var(1, 0), 3, 2), (1, 0));
    }

    /// The KS rows must vanish under a known rank-deficient assignment.
    #[test]
    fn ks_rows_encode_the_kernel_constraints() {
        // 2x2 instance, r = 1: M(lambda) = M0 + l0*A + l1*B. Choose A, B and
        // the target combination so M(l*) has rank 1 with kernel (1, x)^T.
        let a = Gfm::from_values(2, 2, &[1, 0, 0, 1]);
        let b = Gfm::from_values(2, 2, &[0, 1, 1, 0]);
        // Rank-1 target: rows (1, 3) and (2, 6): second column = 3 * first.
        let target = Gfm::from_values(2, 2, &[1, 3, 2, 6]);
        let (l0, l1) = (5u8, 7u8);
        // M0 = target + l0*A + l1*B so that M(l0, l1) = target.
        let mut m0 = Gfm::new(2, 2);
        for ri in 0..2 {
            for ci in 0..2 {
                let v = target.at(ri, ci)
                    ^ gf16::mul(l0, a.at(ri, ci))
                    ^ gf16::mul(l1, b.at(ri, ci));
                m0.set_at(ri, ci, v);
            }
        }
        let mr = MinRank::new(2, 2, 2, 1, m0, vec![a, b]);
        let ks = mr.ks(2);
        let lay = KsLayout::new(2, 1, 2, 2);
        assert_eq!(ks.nrow(), lay.base_nrow());
        assert_eq!(ks.ncol(), lay.base_ncol());

        // Kernel of `target`: column 0 * 3 = column 1, so
        // col_j + x * col_1 = 0 has solutions x(0,0) = 3^{-1}... for j = 0:
        // col_0 = 3^{-1} * col_1, i.e. col_0 + x*col_1 = 0 with x = inv(3).
        // For j = 1: col_1 + x*col_1 = 0 with x = 1.
        let x00 = gf16::inv(3);
        let x10 = 1u8;
        let assign = |vars: &[u16]| -> u8 {
            let val = |v: u16| match v {
                0 => l0,
                1 => l1,
                2 => x00,
                3 => x10,
                _ => unreachable!(),
            };
            match vars.len() {
                0 => 1,
                1 => val(vars[0]),
                2 => gf16::mul(val(vars[0]), val(vars[1])),
                _ => unreachable!(),
            }
        };
        for q in 0..ks.nrow() {
            let mut acc = 0u8;
            for t in 0..ks.ncol() {
                acc ^= gf16::mul(ks.at(q, t), assign(&lay.base_col_vars(t)));
            }
            assert_eq!(acc, 0, "equation {q} does not vanish");
        }
    }
}
