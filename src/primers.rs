//! Primer-pair bookkeeping: the whitespace-separated primer location file
//! and the association of reads with the pair that generated them.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{Read, Strand};

/// One amplicon primer pair; all coordinates 0-based inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimerPair {
    pub fw_left: i32,
    pub fw_right: i32,
    pub rv_left: i32,
    pub rv_right: i32,
}

/// Parse a primer location file: four integers per line, sequence headers
/// (`>` or alphabetic lines) skipped.
pub fn read_primer_file<P: AsRef<Path>>(path: P) -> Result<Vec<PrimerPair>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("unable to open primer file {}", path.display()))?;
    let mut pairs = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('>')
            || trimmed.chars().next().map_or(false, |c| c.is_alphabetic())
        {
            continue;
        }
        let fields: Vec<i32> = trimmed
            .split_whitespace()
            .map(|f| f.parse())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| {
                format!("primer file {} line {}: expected four integers", path.display(), lineno + 1)
            })?;
        if fields.len() != 4 {
            anyhow::bail!(
                "primer file {} line {}: expected four integers, got {}",
                path.display(),
                lineno + 1,
                fields.len()
            );
        }
        pairs.push(PrimerPair {
            fw_left: fields[0],
            fw_right: fields[1],
            rv_left: fields[2],
            rv_right: fields[3],
        });
    }
    Ok(pairs)
}

/// Outcome of associating a read with a primer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimerMatch {
    pub pair: usize,
    /// The read's 5' end sits on the pair's forward primer location.
    pub forward_mapped: bool,
    /// The read's 3' end sits on the pair's reverse primer location.
    pub reverse_mapped: bool,
}

/// Pick the primer pair whose strand-appropriate end lies closest to the
/// read's end, within `max_offset`. Forward reads are anchored by the
/// forward primer's left edge, reverse reads by the reverse primer's right
/// edge; merged pairs consider both ends.
pub fn match_read(read: &Read, pairs: &[PrimerPair], max_offset: i32) -> Option<PrimerMatch> {
    let mut best: Option<(i32, PrimerMatch)> = None;
    for (i, pair) in pairs.iter().enumerate() {
        let fw_offset = (read.left - pair.fw_left).abs();
        let rv_offset = (read.right - pair.rv_right).abs();
        let offset = match read.strand {
            Strand::Forward => fw_offset,
            Strand::Reverse => rv_offset,
            Strand::Unspecified => fw_offset.max(rv_offset),
        };
        if offset <= max_offset && best.map_or(true, |(o, _)| offset < o) {
            best = Some((
                offset,
                PrimerMatch {
                    pair: i,
                    forward_mapped: fw_offset <= max_offset,
                    reverse_mapped: rv_offset <= max_offset,
                },
            ));
        }
    }
    best.map(|(_, m)| m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_primer_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "> amplicon layout").unwrap();
        writeln!(file, "0 19 180 199").unwrap();
        writeln!(file, "150 169 330 349").unwrap();
        let pairs = read_primer_file(file.path()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].fw_left, 150);
        assert_eq!(pairs[0].rv_right, 199);
    }

    #[test]
    fn test_match_read_by_strand() {
        let pairs = vec![
            PrimerPair { fw_left: 0, fw_right: 19, rv_left: 180, rv_right: 199 },
            PrimerPair { fw_left: 150, fw_right: 169, rv_left: 330, rv_right: 349 },
        ];
        let mut read = Read::new("r", 152, 250);
        read.strand = Strand::Forward;
        let m = match_read(&read, &pairs, 10).unwrap();
        assert_eq!(m.pair, 1);
        assert!(m.forward_mapped);
        assert!(!m.reverse_mapped);
        read.strand = Strand::Reverse;
        read.left = 210;
        read.right = 340;
        let m = match_read(&read, &pairs, 10).unwrap();
        assert_eq!(m.pair, 1);
        assert!(m.reverse_mapped);
        read.right = 250;
        assert_eq!(match_read(&read, &pairs, 10), None);
    }

    #[test]
    fn test_merged_read_must_match_both_ends() {
        let pairs = vec![PrimerPair { fw_left: 0, fw_right: 19, rv_left: 180, rv_right: 199 }];
        let read = Read::new("r", 2, 197);
        let m = match_read(&read, &pairs, 10).unwrap();
        assert_eq!(m.pair, 0);
        assert!(m.forward_mapped && m.reverse_mapped);
    }
}
