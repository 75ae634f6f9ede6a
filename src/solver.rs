//! The controller
//!
//! Drives the whole pipeline in the order the resources depend on each
//! other: load, KS system, Macaulay sizing (the `--dry` exit), worker pool,
//! Macaulay assembly, the condensed eliminate/keep pair under one shared row
//! sample, the preallocated Lanczos bag and dedup set, then at most
//! `max_batches` Block-Lanczos batches until enough distinct null vectors
//! are banked. The batch budget is a runtime knob, not a constant.
//!
//! Protocol output goes to the supplied writer so runs are capturable and,
//! under a fixed seed with one thread, byte-identical. Diagnostics go to
//! `tracing` and stay out of the protocol stream.

#![forbid(unsafe_code)]

use crate::cmsm::{partition_cols, Cmsm};
use crate::hmap::NullHashMap;
use crate::lanczos::{iter_num, BlkArgs};
use crate::loader::{self, LoadError};
use crate::mdmac::{MdMac, RowSample};
use crate::minrank::{self, KsLayout};
use crate::nullvec::{self, NullStats};
use crate::opt::Options;
use crate::rblock::RBlock64;
use crate::residual::{Residual, ScDi};
use crate::{Gf16, BLOCK_SIZE};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;
use std::mem;
use tracing::debug;

const MB: f64 = 1024.0 * 1024.0;

/// Failures that abort the run with exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("target rank {r} must be below the column count {ncol}")]
    RankTooLarge { r: usize, ncol: usize },
    #[error("parameter c = {c} cannot exceed the column count {ncol}")]
    CTooLarge { c: usize, ncol: usize },
    #[error("Resultant matrix with more than 512 columns is not supported (got {got})")]
    TooManyColumns { got: u64 },
    #[error("cannot build the worker pool: {0}")]
    Pool(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Machine-readable outcome of a run, mirroring the printed report.
#[derive(Clone, Debug)]
pub struct Summary {
    pub dry: bool,
    pub target_nv_num: u64,
    pub nullvec_count: u64,
    pub batches: u64,
    /// A solution block was printed.
    pub solved: bool,
    /// No "system has no solution" line; meaningful only when solved.
    pub consistent: bool,
    /// Independent residual columns after the final elimination.
    pub independent: u64,
    /// One slot per linear variable; `None` is a free variable.
    pub lambdas: Vec<Option<Gf16>>,
    /// Kernel variables as `((i, j), value)`; `None` is free.
    pub kernel_vars: Vec<((usize, usize), Option<Gf16>)>,
}

/// Placeholder rank estimate for the eliminate side; swap the strategy
/// here if a sharper bound turns up.
#[inline]
fn expected_rank_estimate(rnum: u64, cidxs_sz: u64) -> u64 {
    rnum.min(cidxs_sz)
}

/// Run the solver against `opts`, writing the protocol output to `out`.
pub fn run_with_output(opts: &Options, out: &mut dyn Write) -> Result<Summary, SolveError> {
    let tnum = opts.threads;
    writeln!(out, "number of threads to use: {tnum}")?;

    let mut rng = match opts.seed {
        Some(s) => {
            writeln!(out, "random seed: {s}")?;
            StdRng::seed_from_u64(s)
        }
        None => {
            writeln!(out, "random seed: from system clock")?;
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0);
            StdRng::seed_from_u64(nanos)
        }
    };

    let mr = loader::load_instance(&opts.file)?;
    let (k, r, c) = (mr.nmat(), mr.rank(), opts.c);
    if r >= mr.ncol() {
        return Err(SolveError::RankTooLarge { r, ncol: mr.ncol() });
    }
    if c == 0 || c > mr.ncol() {
        return Err(SolveError::CTooLarge { c, ncol: mr.ncol() });
    }

    writeln!(
        out,
        "[+] Input MinRank instance: {}\n\t\tdimension of matrices: {} x {}\n\t\tnumber of matrices: {}\n\t\ttarget rank: {}",
        opts.file.display(),
        mr.nrow(),
        mr.ncol(),
        k,
        r
    )?;

    let lay = KsLayout::new(k, r, c, mr.nrow());
    let ks = if opts.ks_rand {
        writeln!(out, "[+] Generating random KS matrix:")?;
        minrank::ks_rand(k, r, c, mr.nrow(), &mut rng)
    } else {
        writeln!(out, "[+] Computing KS matrix:")?;
        mr.ks(c)
    };
    writeln!(
        out,
        "\t\tnumber of rows in left multiplier (parameter c): {c}\n\t\tdimension (logical): {} x {}\n\t\tdimension (actual): {} x {}",
        c,
        mr.ncol(),
        ks.nrow(),
        ks.ncol()
    )?;

    writeln!(out, "[+] Selected multi-degree(s):")?;
    for d in &opts.mdegs {
        writeln!(out, "\t\t{d}")?;
    }

    let max_tnum = ks.max_tnum_per_eq();
    let sizing = MdMac::sizing(&ks, &lay, &opts.mdegs);
    writeln!(
        out,
        "[+] Computing multi-degree Macaulay matrix\n\t\tmax number of non-zero entries in a row of the base system: {max_tnum}\n\t\tdimension: {} x {}\n\t\tstorage requirement: {:.2}MB",
        sizing.nrow,
        sizing.ncol,
        sizing.bytes as f64 / MB
    )?;

    let target_nv_num = (minrank::total_var_num(k, r, c) + 1) as u64;
    if opts.dry {
        writeln!(out, "[+] Dry run, stopping after sizing")?;
        return Ok(Summary {
            dry: true,
            target_nv_num,
            nullvec_count: 0,
            batches: 0,
            solved: false,
            consistent: false,
            independent: 0,
            lambdas: Vec::new(),
            kernel_vars: Vec::new(),
        });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(tnum)
        .build()
        .map_err(|e| SolveError::Pool(e.to_string()))?;

    let mdmac = MdMac::from_ks(&ks, lay, &opts.mdegs);
    let cidxs_sz = mdmac.num_nlcol();
    let remaining_ncol = mdmac.num_lincol();
    if remaining_ncol > 512 {
        writeln!(
            out,
            "[!] Resultant matrix with more than 512 columns is not supported"
        )?;
        return Err(SolveError::TooManyColumns { got: remaining_ncol });
    }
    let vnum = minrank::total_var_num(k, r, c);
    debug_assert_eq!((vnum + 1) as u64, remaining_ncol);

    // Variable-to-Macaulay-column map: constant first, then every variable.
    let mut vmap = Vec::with_capacity(remaining_ncol as usize);
    vmap.push(0u64);
    for v in 0..vnum {
        vmap.push(mdmac.vidx_to_midx(v));
    }

    let mac_seed: u64 = rng.gen();
    let mut cmsm_rnum = opts.mac_rows;
    if cmsm_rnum == 0 || cmsm_rnum > mdmac.nrow() {
        cmsm_rnum = mdmac.nrow();
    }
    let sample = RowSample::new(mac_seed, mdmac.nrow() as usize, cmsm_rnum as usize);
    let (nznum, mac_nznum) = mdmac.nznum(&sample);
    let nznum_to_remove: u64 = mdmac
        .cols_matching(crate::mdeg::MDegFilter::NonLinear)
        .map(|ci| nznum[ci as usize])
        .sum();
    let nznum_to_keep: u64 = mdmac
        .cols_matching(crate::mdeg::MDegFilter::Linear)
        .map(|ci| nznum[ci as usize])
        .sum();
    debug_assert_eq!(mac_nznum, nznum_to_remove + nznum_to_keep);
    let cmsm_mem = (Cmsm::mem_size(cidxs_sz, nznum_to_remove)
        + Cmsm::mem_size(remaining_ncol, nznum_to_keep)) as f64
        / MB;
    writeln!(
        out,
        "\t\trows to keep: {cmsm_rnum}\n\t\tcolumns to keep: {remaining_ncol}\n\t\tcolumns to eliminate: {cidxs_sz}\n\t\tnumber of non-zero entries: {mac_nznum} ({:.2}%)\n\t\tsize of column-majored condensed multi-degree Macaulay: {:.2}MB",
        100.0 * mac_nznum as f64 / cmsm_rnum as f64 / cidxs_sz.max(1) as f64,
        cmsm_mem
    )?;

    writeln!(out, "[+] Condensing multi-degree Macaulay along columns")?;
    let cmsm = Cmsm::from_mdmac(&mdmac, &sample, crate::mdeg::MDegFilter::NonLinear);
    let cmsm_kept = Cmsm::from_mdmac(&mdmac, &sample, crate::mdeg::MDegFilter::Linear);
    writeln!(
        out,
        "[+] Done\n\t\tmax number of entries to eliminate in a column: {}\n\t\tavg number of entries to eliminate in a column: {}",
        cmsm.max_tnum(),
        cmsm.avg_tnum()
    )?;

    let rnum = cmsm.rnum();
    let mut blkargs = BlkArgs::new(rnum, cmsm.cidxs_sz(), tnum);
    let kept_ranges = partition_cols(cmsm_kept.cidxs_sz(), tnum);
    let mut hmap = NullHashMap::new(target_nv_num as usize * 10);
    let mut residual = Residual::for_width(remaining_ncol as usize);
    residual.zero();
    let mut prod = RBlock64::new(cmsm_kept.cidxs_sz());
    let mut vec_buf = vec![0u8; remaining_ncol as usize];
    let var_rows = nullvec::variable_row_map(&cmsm_kept, &vmap);

    let expected_rank = expected_rank_estimate(rnum as u64, cidxs_sz);
    let budget = iter_num(BLOCK_SIZE, expected_rank);
    writeln!(
        out,
        "[+] Try to extract {target_nv_num} nullvectors\n\t\texpected rank of submatrix to eliminate: {expected_rank}\n\t\tblock size: {BLOCK_SIZE}\n\t\texpected number of iterations: {budget}",
    )?;

    // The Macaulay matrix is no longer needed; the condensed pair carries
    // everything from here on.
    mem::drop(mdmac);

    let mut stats = NullStats::default();
    #[cfg(feature = "collect-stats")]
    let mut elim_prod = RBlock64::new(cmsm.cidxs_sz());
    let mut batches = 0u64;
    while batches < opts.max_batches && (hmap.len() as u64) < target_nv_num {
        batches += 1;
        let iter_count = blkargs.run(&cmsm, &pool, &mut rng, budget);
        #[cfg(feature = "collect-stats")]
        {
            let mask = nullvec::verify_nullvec(
                &mut elim_prod,
                &cmsm,
                blkargs.candidates(),
                blkargs.col_ranges(),
                &pool,
            );
            let zero_cols = blkargs.candidates().zero_col_positions();
            stats.zero_nv += zero_cols.count_ones() as u64;
            stats.invalid_nv += (!mask & !zero_cols).count_ones() as u64;
        }
        let nvc = nullvec::proc_nullvec(
            &mut hmap,
            &mut residual,
            &mut prod,
            blkargs.candidates(),
            &cmsm_kept,
            &kept_ranges,
            &pool,
            &var_rows,
            &mut vec_buf,
            &mut stats,
        );
        debug!(batch = batches, iter_count, nvc, total = hmap.len(), "batch done");
        writeln!(
            out,
            "[+] {batches}-th batch: {iter_count} iterations, {nvc} nullvectors"
        )?;
    }

    writeln!(
        out,
        "[+] Block Lanczos finished in {batches} batches\n\t\tnullvectors extracted: {}",
        hmap.len()
    )?;
    #[cfg(feature = "collect-stats")]
    writeln!(
        out,
        "\t\tnullvectors dropped due to capacity: {}\n\t\tnullvectors dropped due to duplication: {}\n\t\tnullvectors that are full zero: {}\n\t\tnullvectors not in the left kernel: {}",
        stats.full, stats.dup, stats.zero_nv, stats.invalid_nv
    )?;
    let mut summary = Summary {
        dry: false,
        target_nv_num,
        nullvec_count: hmap.len() as u64,
        batches,
        solved: false,
        consistent: false,
        independent: 0,
        lambdas: Vec::new(),
        kernel_vars: Vec::new(),
    };

    if (hmap.len() as u64) >= target_nv_num {
        writeln!(out, "[+] Solving the extracted linear system")?;
        if opts.ks_rand {
            writeln!(
                out,
                "[!] This solution is for the randomly sampled KS matrix!\n\t\tNot the original MinRank instance!"
            )?;
        }
        let di = residual.gj();
        summary.independent = di.popcount();
        if summary.independent < target_nv_num - 1 {
            writeln!(
                out,
                "[!] Failed, only {} nullvectors are independent",
                summary.independent
            )?;
        } else {
            print_sol(out, &residual, &di, k, r, c, &mut summary)?;
            summary.solved = true;
        }
    }

    Ok(summary)
}

/// Print the solved variables, free ones flagged, after checking the unused
/// equations for consistency.
fn print_sol(
    out: &mut dyn Write,
    res: &Residual,
    di: &ScDi,
    k: usize,
    r: usize,
    c: usize,
    summary: &mut Summary,
) -> std::io::Result<()> {
    let total_vnum = minrank::total_var_num(k, r, c);
    summary.consistent = true;
    for i in total_vnum..res.width() {
        if res.sol_at(i) != 0 {
            writeln!(out, "[+] The system has no solution")?;
            summary.consistent = false;
            break;
        }
    }

    writeln!(out, "[+] Solution:")?;
    writeln!(out, "\t\tlinear variables:")?;
    for i in 0..k {
        if di.bit(i) {
            let v = res.sol_at(i);
            writeln!(out, "\t\tlambda_{i} = {v}")?;
            summary.lambdas.push(Some(v));
        } else {
            writeln!(out, "\t\tlambda_{i} = free variable")?;
            summary.lambdas.push(None);
        }
    }
    writeln!(out, "\t\tkernel variables:")?;
    for i in k..total_vnum {
        let (vi, vj) = minrank::kernel_var_idx_to_2d(i, k, r);
        if di.bit(i) {
            let v = res.sol_at(i);
            writeln!(out, "\t\tx({vi}, {vj}) = {v}")?;
            summary.kernel_vars.push(((vi, vj), Some(v)));
        } else {
            writeln!(out, "\t\tx({vi}, {vj}) = free variable")?;
            summary.kernel_vars.push(((vi, vj), None));
        }
    }
    Ok(())
}
