//! MinRank instance loader
//!
//! Plain text: `#` starts a comment, values split on commas or whitespace.
//! The first four values are `nrow ncol k r`, followed by
//! `(k + 1) * nrow * ncol` coefficients in `0..=15`, row-major, `M0` first
//! and then `M1..Mk`. Ragged or truncated files are precise errors, not
//! best-effort loads.

#![forbid(unsafe_code)]

use crate::gfm::Gfm;
use crate::minrank::MinRank;
use std::path::Path;

/// Failure modes of the instance loader.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read instance file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: cannot parse `{token}` as a number")]
    Parse { line: usize, token: String },
    #[error("line {line}: coefficient {value} is outside GF(16)")]
    Range { line: usize, value: u64 },
    #[error("header needs nrow, ncol, k, and r")]
    Header,
    #[error("header dimension `{name}` must be positive")]
    BadDim { name: &'static str },
    #[error("expected {expected} coefficients, found {found}")]
    Count { expected: usize, found: usize },
}

/// Parse an instance from a string.
pub fn parse_instance(text: &str) -> Result<MinRank, LoadError> {
    let mut values: Vec<(u64, usize)> = Vec::new();
    for (li, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("");
        for token in line.split(|ch: char| ch.is_whitespace() || ch == ',') {
            if token.is_empty() {
                continue;
            }
            let v: u64 = token.parse().map_err(|_| LoadError::Parse {
                line: li + 1,
                token: token.to_string(),
            })?;
            values.push((v, li + 1));
        }
    }

    if values.len() < 4 {
        return Err(LoadError::Header);
    }
    let nrow = values[0].0 as usize;
    let ncol = values[1].0 as usize;
    let k = values[2].0 as usize;
    let r = values[3].0 as usize;
    for (v, name) in [(nrow, "nrow"), (ncol, "ncol"), (k, "k"), (r, "r")] {
        if v == 0 {
            return Err(LoadError::BadDim { name });
        }
    }

    let per_matrix = nrow * ncol;
    let expected = (k + 1) * per_matrix;
    let coeffs = &values[4..];
    if coeffs.len() != expected {
        return Err(LoadError::Count {
            expected,
            found: coeffs.len(),
        });
    }
    for &(v, line) in coeffs {
        if v > 15 {
            return Err(LoadError::Range { line, value: v });
        }
    }

    let bytes: Vec<u8> = coeffs.iter().map(|&(v, _)| v as u8).collect();
    let m0 = Gfm::from_values(nrow, ncol, &bytes[..per_matrix]);
    let ms: Vec<Gfm> = (0..k)
        .map(|i| {
            Gfm::from_values(
                nrow,
                ncol,
                &bytes[(i + 1) * per_matrix..(i + 2) * per_matrix],
            )
        })
        .collect();
    Ok(MinRank::new(nrow, ncol, k, r, m0, ms))
}

/// Load an instance file.
pub fn load_instance(path: &Path) -> Result<MinRank, LoadError> {
    let text = std::fs::read_to_string(path)?;
    parse_instance(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_commented_instance() {
        let text = "\
# 2x2, two matrices, rank 1
2 2 2 1
1, 2   # M0
3, 4
0 1    # M1
1 0
5 6    # M2
7 8
";
        let mr = parse_instance(text).unwrap();
        assert_eq!((mr.nrow(), mr.ncol(), mr.nmat(), mr.rank()), (2, 2, 2, 1));
        assert_eq!(mr.m0().at(1, 0), 3);
        assert_eq!(mr.ms()[0].at(0, 1), 1);
        assert_eq!(mr.ms()[1].at(1, 1), 8);
    }

    #[test]
    fn precise_errors() {
        assert!(matches!(parse_instance(""), Err(LoadError::Header)));
        assert!(matches!(
            parse_instance("2 2 1 0"),
            Err(LoadError::BadDim { name: "r" })
        ));
        assert!(matches!(
            parse_instance("1 1 1 1\n3"),
            Err(LoadError::Count {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            parse_instance("1 1 1 1\n3 99"),
            Err(LoadError::Range { value: 99, .. })
        ));
        assert!(matches!(
            parse_instance("1 1 1 x\n3 4"),
            Err(LoadError::Parse { .. })
        ));
    }
}
