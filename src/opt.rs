//! Command-line options
//!
//! Hand-rolled flag walk over the argument list; one positional instance
//! path plus the solver knobs. Multi-degrees repeat: every `--mdeg` adds one
//! target, each a comma list of `c + 1` group degrees, and all targets must
//! agree on the total degree.

#![forbid(unsafe_code)]

use crate::mdeg::MDeg;
use std::path::PathBuf;

/// Usage text printed for `-h` and on usage errors.
pub const USAGE: &str = "\
usage: mrsolver [options] <instance-file>

options:
    -c C              number of rows of the left multiplier (required)
    --mdeg d0,..,dc   one target multi-degree; repeatable (required)
    --threads N       worker pool size (default 1)
    --seed S          seed the RNG deterministically
    --mac-rows R      cap on sampled Macaulay rows (0 = all)
    --max-batches B   Block-Lanczos batch budget (default 8)
    --ks-rand         replace the input with a random KS matrix
    --dry             size the data structures, then exit
    -h                print this help
";

/// Parsed option bag.
#[derive(Clone, Debug)]
pub struct Options {
    pub file: PathBuf,
    pub threads: usize,
    pub seed: Option<u64>,
    pub c: usize,
    pub mdegs: Vec<MDeg>,
    pub mac_rows: u64,
    pub ks_rand: bool,
    pub dry: bool,
    pub max_batches: u64,
}

/// Outcome of a parse: run, or print help and exit cleanly.
#[derive(Clone, Debug)]
pub enum Parsed {
    Help,
    Run(Options),
}

/// Flag-level failures; each maps to exit code 1 with the usage text.
#[derive(Debug, thiserror::Error)]
pub enum OptError {
    #[error("flag {0} needs a value")]
    MissingValue(String),
    #[error("flag {flag}: cannot parse `{value}`")]
    BadValue { flag: String, value: String },
    #[error("unknown flag {0}")]
    Unknown(String),
    #[error("no instance file given")]
    MissingFile,
    #[error("-c is required")]
    MissingC,
    #[error("at least one --mdeg is required")]
    MissingMdeg,
    #[error("--mdeg needs {expected} entries for c = {c}, got {got}")]
    MdegLen { expected: usize, c: usize, got: usize },
    #[error("all --mdeg targets must share one total degree")]
    MdegTotals,
    #[error("--threads must be positive")]
    ZeroThreads,
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, OptError> {
    value.parse().map_err(|_| OptError::BadValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn take<'a>(it: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a String, OptError> {
    it.next().ok_or_else(|| OptError::MissingValue(flag.into()))
}

/// Parse the argument list (without the program name).
pub fn parse(args: &[String]) -> Result<Parsed, OptError> {
    let mut file: Option<PathBuf> = None;
    let mut threads = 1usize;
    let mut seed = None;
    let mut c: Option<usize> = None;
    let mut raw_mdegs: Vec<Vec<u8>> = Vec::new();
    let mut mac_rows = 0u64;
    let mut ks_rand = false;
    let mut dry = false;
    let mut max_batches = 8u64;

    let mut it = args.iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help),
            "--threads" => threads = parse_num("--threads", take(&mut it, "--threads")?)?,
            "--seed" => seed = Some(parse_num("--seed", take(&mut it, "--seed")?)?),
            "-c" => c = Some(parse_num("-c", take(&mut it, "-c")?)?),
            "--mac-rows" => mac_rows = parse_num("--mac-rows", take(&mut it, "--mac-rows")?)?,
            "--max-batches" => {
                max_batches = parse_num("--max-batches", take(&mut it, "--max-batches")?)?
            }
            "--ks-rand" => ks_rand = true,
            "--dry" => dry = true,
            "--mdeg" => {
                let v = take(&mut it, "--mdeg")?;
                let degs: Result<Vec<u8>, _> =
                    v.split(',').map(|t| parse_num("--mdeg", t.trim())).collect();
                raw_mdegs.push(degs?);
            }
            flag if flag.starts_with('-') => return Err(OptError::Unknown(flag.to_string())),
            path => file = Some(PathBuf::from(path)),
        }
    }

    let file = file.ok_or(OptError::MissingFile)?;
    let c = c.ok_or(OptError::MissingC)?;
    if threads == 0 {
        return Err(OptError::ZeroThreads);
    }
    if raw_mdegs.is_empty() {
        return Err(OptError::MissingMdeg);
    }
    let mdegs: Vec<MDeg> = raw_mdegs
        .into_iter()
        .map(|d| {
            if d.len() != c + 1 {
                Err(OptError::MdegLen {
                    expected: c + 1,
                    c,
                    got: d.len(),
                })
            } else {
                Ok(MDeg::new(d))
            }
        })
        .collect::<Result<_, _>>()?;
    let total = mdegs[0].total();
    if mdegs.iter().any(|d| d.total() != total) {
        return Err(OptError::MdegTotals);
    }

    Ok(Parsed::Run(Options {
        file,
        threads,
        seed,
        c,
        mdegs,
        mac_rows,
        ks_rand,
        dry,
        max_batches,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn full_flag_set() {
        let p = parse(&argv(
            "--threads 4 --seed 42 -c 2 --mdeg 1,1,2 --mdeg 1,1,2 --mac-rows 100 \
             --max-batches 3 --ks-rand --dry instance.txt",
        ))
        .unwrap();
        let o = match p {
            Parsed::Run(o) => o,
            Parsed::Help => panic!("not help"),
        };
        assert_eq!(o.threads, 4);
        assert_eq!(o.seed, Some(42));
        assert_eq!(o.c, 2);
        assert_eq!(o.mdegs.len(), 2);
        assert_eq!(o.mac_rows, 100);
        assert_eq!(o.max_batches, 3);
        assert!(o.ks_rand && o.dry);
        assert_eq!(o.file, PathBuf::from("instance.txt"));
    }

    #[test]
    fn help_wins() {
        assert!(matches!(parse(&argv("-h")), Ok(Parsed::Help)));
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(matches!(
            parse(&argv("instance.txt --mdeg 1,1")),
            Err(OptError::MissingC)
        ));
        assert!(matches!(
            parse(&argv("-c 1 instance.txt")),
            Err(OptError::MissingMdeg)
        ));
        assert!(matches!(
            parse(&argv("-c 2 --mdeg 1,1 instance.txt")),
            Err(OptError::MdegLen { expected: 3, .. })
        ));
        assert!(matches!(
            parse(&argv("-c 1 --mdeg 1,1 --mdeg 2,1 instance.txt")),
            Err(OptError::MdegTotals)
        ));
        assert!(matches!(
            parse(&argv("--bogus")),
            Err(OptError::Unknown(_))
        ));
        assert!(matches!(
            parse(&argv("--threads")),
            Err(OptError::MissingValue(_))
        ));
        assert!(matches!(
            parse(&argv("--threads 0 -c 1 --mdeg 1,1 f")),
            Err(OptError::ZeroThreads)
        ));
        assert!(matches!(parse(&argv("-c 1 --mdeg 1,1")), Err(OptError::MissingFile)));
    }
}
