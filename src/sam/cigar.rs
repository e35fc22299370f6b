use regex::Regex;

use crate::errors::Error;

lazy_static! {
    // one CIGAR operation: length followed by operator
    static ref CIGAR_OP: Regex = Regex::new(r"([0-9]+)([MIDNSHP=X])").unwrap();
}

/// A single CIGAR operation with its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarOp {
    Match(u32),
    Ins(u32),
    Del(u32),
    RefSkip(u32),
    SoftClip(u32),
    HardClip(u32),
    Pad(u32),
    Equal(u32),
    Diff(u32),
}

impl CigarOp {
    pub fn len(self) -> u32 {
        match self {
            CigarOp::Match(n)
            | CigarOp::Ins(n)
            | CigarOp::Del(n)
            | CigarOp::RefSkip(n)
            | CigarOp::SoftClip(n)
            | CigarOp::HardClip(n)
            | CigarOp::Pad(n)
            | CigarOp::Equal(n)
            | CigarOp::Diff(n) => n,
        }
    }

    pub fn consumes_query(self) -> bool {
        match self {
            CigarOp::Match(_)
            | CigarOp::Ins(_)
            | CigarOp::SoftClip(_)
            | CigarOp::Equal(_)
            | CigarOp::Diff(_) => true,
            _ => false,
        }
    }

    pub fn consumes_reference(self) -> bool {
        match self {
            CigarOp::Match(_)
            | CigarOp::Del(_)
            | CigarOp::RefSkip(_)
            | CigarOp::Equal(_)
            | CigarOp::Diff(_) => true,
            _ => false,
        }
    }
}

/// Tokenize a CIGAR string into alternating length/operator pairs.
///
/// `*` (no alignment) yields an empty vector. The concatenated matches must
/// reproduce the input exactly; anything left over means the string is not a
/// valid CIGAR.
pub fn parse_cigar(cigar: &str, id: &str) -> Result<Vec<CigarOp>, Error> {
    if cigar == "*" {
        return Ok(Vec::new());
    }
    let mut ops = Vec::new();
    let mut matched_len = 0;
    for cap in CIGAR_OP.captures_iter(cigar) {
        let whole = cap.get(0).unwrap();
        matched_len += whole.end() - whole.start();
        let n: u32 = cap[1].parse().map_err(|_| Error::MalformedCigar {
            id: id.to_owned(),
            cigar: cigar.to_owned(),
        })?;
        let op = match &cap[2] {
            "M" => CigarOp::Match(n),
            "I" => CigarOp::Ins(n),
            "D" => CigarOp::Del(n),
            "N" => CigarOp::RefSkip(n),
            "S" => CigarOp::SoftClip(n),
            "H" => CigarOp::HardClip(n),
            "P" => CigarOp::Pad(n),
            "=" => CigarOp::Equal(n),
            "X" => CigarOp::Diff(n),
            _ => unreachable!(),
        };
        ops.push(op);
    }
    if matched_len != cigar.len() || ops.is_empty() {
        return Err(Error::MalformedCigar {
            id: id.to_owned(),
            cigar: cigar.to_owned(),
        });
    }
    Ok(ops)
}

/// Number of reference positions consumed by the alignment.
pub fn reference_span(ops: &[CigarOp]) -> i32 {
    ops.iter()
        .filter(|op| op.consumes_reference())
        .map(|op| op.len() as i32)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cigar() {
        assert_eq!(
            parse_cigar("3M1I7M", "r").unwrap(),
            vec![CigarOp::Match(3), CigarOp::Ins(1), CigarOp::Match(7)]
        );
        assert_eq!(
            parse_cigar("5=2X3=", "r").unwrap(),
            vec![CigarOp::Equal(5), CigarOp::Diff(2), CigarOp::Equal(3)]
        );
        assert_eq!(parse_cigar("*", "r").unwrap(), Vec::new());
    }

    #[test]
    fn test_parse_cigar_rejects_garbage() {
        assert!(parse_cigar("10Q", "r").is_err());
        assert!(parse_cigar("10MM1I10M", "r").is_err());
        assert!(parse_cigar("100M5", "r").is_err());
        assert!(parse_cigar("", "r").is_err());
    }

    #[test]
    fn test_reference_span() {
        assert_eq!(reference_span(&parse_cigar("2M1I1M", "r").unwrap()), 3);
        assert_eq!(reference_span(&parse_cigar("2M1D1M", "r").unwrap()), 4);
        assert_eq!(reference_span(&parse_cigar("2S4M2S", "r").unwrap()), 4);
    }
}
