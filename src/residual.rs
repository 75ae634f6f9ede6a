//! Width-dispatched residual containers
//!
//! The residual system collects accepted null vectors as rows: the variable
//! coefficients land in the residual matrix, the constant term in the
//! sibling solution container (column 0), which is exactly the shape the
//! Gauss-Jordan contract wants for system solving. The container width is
//! the smallest of 64/128/256/512 covering the remaining column count,
//! chosen once per invocation; everything downstream dispatches over this
//! enum, monomorphized per width, with no indirection in the hot loop.

#![forbid(unsafe_code)]

use crate::bits::Lane;
use crate::rcblock::{RcBlock128, RcBlock256, RcBlock512, RcBlock64};
use crate::Gf16;

/// Residual matrix plus solution container at the selected width.
pub enum Residual {
    W64 {
        mat: Box<RcBlock64>,
        sol: Box<RcBlock64>,
    },
    W128 {
        mat: Box<RcBlock128>,
        sol: Box<RcBlock128>,
    },
    W256 {
        mat: Box<RcBlock256>,
        sol: Box<RcBlock256>,
    },
    W512 {
        mat: Box<RcBlock512>,
        sol: Box<RcBlock512>,
    },
}

/// Independent-column mask at the selected width.
pub enum ScDi {
    B64(u64),
    B128(crate::bits::Lane128),
    B256(crate::bits::Lane256),
    B512(crate::bits::Lane512),
}

impl ScDi {
    pub fn popcount(&self) -> u64 {
        match self {
            ScDi::B64(m) => m.count_ones() as u64,
            ScDi::B128(m) => m.popcount() as u64,
            ScDi::B256(m) => m.popcount() as u64,
            ScDi::B512(m) => m.popcount() as u64,
        }
    }

    pub fn bit(&self, i: usize) -> bool {
        match self {
            ScDi::B64(m) => (m >> i) & 0x1 != 0,
            ScDi::B128(m) => m.bit(i) != 0,
            ScDi::B256(m) => m.bit(i) != 0,
            ScDi::B512(m) => m.bit(i) != 0,
        }
    }
}

macro_rules! on_pair {
    ($self:expr, $mat:ident, $sol:ident => $body:expr) => {
        match $self {
            Residual::W64 { mat: $mat, sol: $sol } => $body,
            Residual::W128 { mat: $mat, sol: $sol } => $body,
            Residual::W256 { mat: $mat, sol: $sol } => $body,
            Residual::W512 { mat: $mat, sol: $sol } => $body,
        }
    };
}

impl Residual {
    /// Smallest supported width covering `remaining_ncol`. Anything past
    /// 512 was rejected at configuration time.
    pub fn for_width(remaining_ncol: usize) -> Self {
        debug_assert!(remaining_ncol <= 512, "residual wider than 512 columns");
        if remaining_ncol > 256 {
            Residual::W512 {
                mat: Box::new(RcBlock512::new()),
                sol: Box::new(RcBlock512::new()),
            }
        } else if remaining_ncol > 128 {
            Residual::W256 {
                mat: Box::new(RcBlock256::new()),
                sol: Box::new(RcBlock256::new()),
            }
        } else if remaining_ncol > 64 {
            Residual::W128 {
                mat: Box::new(RcBlock128::new()),
                sol: Box::new(RcBlock128::new()),
            }
        } else {
            Residual::W64 {
                mat: Box::new(RcBlock64::new()),
                sol: Box::new(RcBlock64::new()),
            }
        }
    }

    /// Selected container width.
    pub fn width(&self) -> usize {
        match self {
            Residual::W64 { .. } => 64,
            Residual::W128 { .. } => 128,
            Residual::W256 { .. } => 256,
            Residual::W512 { .. } => 512,
        }
    }

    pub fn zero(&mut self) {
        on_pair!(self, mat, sol => {
            mat.zero();
            sol.zero();
        })
    }

    /// Coefficient `pos` of residual row `dst_idx`.
    pub fn set_mat(&mut self, dst_idx: usize, pos: usize, v: Gf16) {
        on_pair!(self, mat, _sol => mat.set_at(dst_idx, pos, v))
    }

    /// Constant term of residual row `dst_idx` (column 0 of the solution
    /// container).
    pub fn set_sol(&mut self, dst_idx: usize, v: Gf16) {
        on_pair!(self, _mat, sol => sol.set_at(dst_idx, 0, v))
    }

    pub fn mat_at(&self, i: usize, j: usize) -> Gf16 {
        on_pair!(self, mat, _sol => mat.at(i, j))
    }

    /// Solved value of variable-column `i` after [`Self::gj`].
    pub fn sol_at(&self, i: usize) -> Gf16 {
        on_pair!(self, _mat, sol => sol.at(i, 0))
    }

    /// Final dense elimination: reduce the residual matrix, carrying the
    /// constant column along, and report the independent columns.
    pub fn gj(&mut self) -> ScDi {
        match self {
            Residual::W64 { mat, sol } => ScDi::B64(mat.gj(sol)),
            Residual::W128 { mat, sol } => ScDi::B128(mat.gj(sol)),
            Residual::W256 { mat, sol } => ScDi::B256(mat.gj(sol)),
            Residual::W512 { mat, sol } => ScDi::B512(mat.gj(sol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_selection_is_the_smallest_cover() {
        assert_eq!(Residual::for_width(1).width(), 64);
        assert_eq!(Residual::for_width(64).width(), 64);
        assert_eq!(Residual::for_width(65).width(), 128);
        assert_eq!(Residual::for_width(128).width(), 128);
        assert_eq!(Residual::for_width(129).width(), 256);
        assert_eq!(Residual::for_width(257).width(), 512);
        assert_eq!(Residual::for_width(512).width(), 512);
    }

    #[test]
    fn gj_solves_a_planted_system() {
        // Rows: equations sum_j m[i][j] * x_j = b_i over 5 variables at
        // width 64. Plant x and generate consistent rows.
        let x: Vec<u8> = vec![3, 0, 7, 12, 1];
        let mut res = Residual::for_width(6);
        let rows: Vec<Vec<u8>> = vec![
            vec![1, 0, 0, 0, 0],
            vec![0, 1, 0, 0, 0],
            vec![1, 1, 1, 0, 0],
            vec![0, 0, 0, 2, 0],
            vec![0, 0, 1, 0, 9],
            vec![1, 2, 3, 4, 5],
        ];
        for (ri, row) in rows.iter().enumerate() {
            let mut b = 0u8;
            for (j, &coef) in row.iter().enumerate() {
                res.set_mat(ri, j, coef);
                b ^= crate::gf16::mul(coef, x[j]);
            }
            res.set_sol(ri, b);
        }
        let di = res.gj();
        assert_eq!(di.popcount(), 5);
        for (j, &want) in x.iter().enumerate() {
            assert!(di.bit(j));
            assert_eq!(res.sol_at(j), want, "x[{j}]");
        }
        // Unused columns are dependent.
        assert!(!di.bit(5));
    }
}
