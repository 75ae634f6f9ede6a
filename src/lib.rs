//! Crate root: public surface, core aliases, and solver-wide invariants
//!
//! This crate solves MinRank instances over GF(16) by the Kipnis-Shamir
//! encoding: the instance is linearized into a bilinear base system, amplified
//! into a multi-degree Macaulay matrix, condensed into a tall sparse
//! column-major form, and attacked with Block-Lanczos over blocks of 64
//! GF(16) vectors. Surviving left-kernel vectors become rows of a small dense
//! residual system which a final Gauss-Jordan pass solves for the linear and
//! kernel variables.
//!
//! ## Invariants
//!
//! - **Field.** GF(16) is fixed as GF(2)[x]/(x^4 + x + 1). Elements are bytes
//!   in `0..=15`; addition is XOR. No other field is supported.
//! - **Block width.** Every Lanczos block is 64 vectors wide
//!   ([`BLOCK_SIZE`]). The residual containers widen to 128/256/512 columns,
//!   selected once per invocation; more than 512 remaining columns is a
//!   configuration error, never a runtime branch.
//! - **Alignment.** Bit-sliced block storage is 64-byte aligned and the
//!   sliced kernels are branch-free on data: scalars select whole planes
//!   through lsb-extended masks.
//! - **Determinism.** All pseudo-random draws flow through one `StdRng`
//!   seeded at startup. A fixed seed with one worker thread reproduces the
//!   protocol output byte for byte.
//! - **Allocation discipline.** Every container of the Lanczos loop is
//!   allocated before the first batch and reused; the inner iteration
//!   performs no allocation.

#![forbid(unsafe_code)]

/// Scalar GF(16) arithmetic and the fixed inversion table.
pub mod gf16;
/// Packed byte arrays of GF(16) elements (word-at-a-time kernels).
pub mod gfa;
/// Fixed-width bit lanes (64 to 512 bits) and set-bit utilities.
pub mod bits;
/// Arbitrary-length bit-packed maps with popcount/ctz/enumeration.
pub mod bitmap;
/// Bit-sliced blocks of 64/128/256/512 GF(16) elements.
pub mod grp;
/// Row-major block vectors of width 64 built on the sliced blocks.
pub mod rblock;
/// Square 64..512 blocks with permuted-row Gauss-Jordan.
pub mod rcblock;
/// Dense row-major GF(16) matrices (instance coefficients, KS system).
pub mod gfm;
/// Multi-degrees and the linear/nonlinear column classification.
pub mod mdeg;
/// MinRank instances and the Kipnis-Shamir base system.
pub mod minrank;
/// Multi-degree Macaulay assembly, column order, and sizing.
pub mod mdmac;
/// Condensed column-major sparse Macaulay matrix and its products.
pub mod cmsm;
/// Bounded content-addressed digest set for null-vector dedup.
pub mod hmap;
/// Block-Lanczos over GF(16), 64 vectors per step.
pub mod lanczos;
/// Width-dispatched residual matrix, solution container, and final solve.
pub mod residual;
/// Null-vector verification, extraction, and dedup pipeline.
pub mod nullvec;
/// MinRank instance file loader.
pub mod loader;
/// Command-line option bag and usage text.
pub mod opt;
/// The controller: batches, statistics, resource lifecycle.
pub mod solver;

/// A GF(16) element. Only the low nibble is meaningful; every public
/// operation keeps values in `0..=15`.
pub type Gf16 = u8;

/// Largest GF(16) element.
pub const GF16_MAX: Gf16 = 15;

/// Width of a Block-Lanczos block: 64 vectors advance per iteration.
pub const BLOCK_SIZE: usize = 64;

pub use opt::Options;
pub use solver::{run_with_output, Summary};
