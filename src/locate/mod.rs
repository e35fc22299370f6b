//! Mutation locator: reconstructs the alignment of one record against the
//! reference by walking CIGAR and MD operations simultaneously, emitting one
//! `Mutation` per deviation and rebuilding the local reference over the
//! mapped span.

pub mod ambig;

use bv::BitVec;

use crate::errors::Error;
use crate::model::{MappingCategory, Read, Strand};
use crate::sam::md::MdOp;
use crate::sam::{CigarOp, SamRecord};

/// Cursor over MD operations that supports partial consumption, because a
/// single MD match run can stretch across several CIGAR operations (MD does
/// not see insertions).
struct MdCursor<'a> {
    ops: &'a [MdOp],
    index: usize,
    consumed: u32,
}

enum MdChunk<'a> {
    Match(u32),
    Mismatch(&'a str),
}

impl<'a> MdCursor<'a> {
    fn new(ops: &'a [MdOp]) -> Self {
        MdCursor {
            ops,
            index: 0,
            consumed: 0,
        }
    }

    /// Take up to `max` positions from the current match/mismatch operation.
    fn take_aligned(&mut self, max: u32) -> Option<MdChunk<'a>> {
        let op = self.ops.get(self.index)?;
        let take = max.min(op.len() - self.consumed);
        let chunk = match op {
            MdOp::Match(_) => MdChunk::Match(take),
            MdOp::Mismatch(bases) => {
                let start = self.consumed as usize;
                MdChunk::Mismatch(&bases[start..start + take as usize])
            }
            MdOp::Deletion(_) => return None,
        };
        self.consumed += take;
        if self.consumed == op.len() {
            self.index += 1;
            self.consumed = 0;
        }
        Some(chunk)
    }

    /// Take a whole deletion operation of exactly `len` bases.
    fn take_deletion(&mut self, len: u32) -> Option<&'a str> {
        match self.ops.get(self.index) {
            Some(MdOp::Deletion(bases)) if self.consumed == 0 && bases.len() as u32 == len => {
                self.index += 1;
                Some(bases)
            }
            _ => None,
        }
    }

    fn exhausted(&self) -> bool {
        self.index >= self.ops.len()
    }
}

fn slice_query(rec: &SamRecord, qs: usize, n: usize) -> Option<(&str, &str)> {
    if qs + n > rec.seq.len() || qs + n > rec.qual.len() {
        None
    } else {
        Some((&rec.seq[qs..qs + n], &rec.qual[qs..qs + n]))
    }
}

/// Turn a parsed alignment record into a `Read` with local reference,
/// projected qualities and located mutations, resolving ambiguously placed
/// indels. Records below the MAPQ threshold keep their mapped span only.
pub fn locate_read(rec: &SamRecord, min_mapq: u8) -> Result<Read, Error> {
    let strand = if rec.is_reverse() {
        Strand::Reverse
    } else {
        Strand::Forward
    };

    if rec.is_unmapped() {
        let mut read = Read::new(&rec.id, 0, -1);
        read.mapping_category = MappingCategory::Unmapped;
        read.strand = Strand::Unspecified;
        return Ok(read);
    }

    if rec.mapq < min_mapq {
        let mut read = Read::new(&rec.id, rec.pos, rec.ref_end());
        read.mapping_category = MappingCategory::LowMapq;
        read.strand = strand;
        read.mapped_depth = BitVec::new_fill(true, read.len() as u64);
        return Ok(read);
    }

    let mut read = walk(rec)?;
    read.strand = strand;
    ambig::resolve_ambiguous_indels(&mut read);
    Ok(read)
}

fn walk(rec: &SamRecord) -> Result<Read, Error> {
    let mismatch = |op: &str| Error::MdCigarMismatch {
        id: rec.id.clone(),
        op: op.to_owned(),
    };
    let overrun = || Error::MalformedCigar {
        id: rec.id.clone(),
        cigar: rec
            .cigar
            .iter()
            .map(|op| format!("{:?}", op))
            .collect::<Vec<_>>()
            .join(""),
    };

    let md_ops = rec.md.as_deref().expect("mapped record without MD ops");
    let mut md = MdCursor::new(md_ops);

    let mut ts = rec.pos; // target cursor
    let mut qs: usize = 0; // query cursor
    let mut local_seq = String::with_capacity(rec.seq.len());
    let mut local_qual = String::with_capacity(rec.seq.len());
    let mut mutations = Vec::new();

    for op in &rec.cigar {
        match *op {
            CigarOp::Match(n) | CigarOp::Equal(n) | CigarOp::Diff(n) => {
                let mut remaining = n;
                while remaining > 0 {
                    let chunk = md.take_aligned(remaining).ok_or_else(|| mismatch("M"))?;
                    match chunk {
                        MdChunk::Match(k) => {
                            if let CigarOp::Diff(_) = op {
                                return Err(mismatch("X"));
                            }
                            let (s, q) = slice_query(rec, qs, k as usize).ok_or_else(overrun)?;
                            local_seq.push_str(s);
                            local_qual.push_str(q);
                            ts += k as i32;
                            qs += k as usize;
                            remaining -= k;
                        }
                        MdChunk::Mismatch(bases) => {
                            if let CigarOp::Equal(_) = op {
                                return Err(mismatch("="));
                            }
                            let k = bases.len();
                            let (s, q) = slice_query(rec, qs, k).ok_or_else(overrun)?;
                            mutations.push(crate::model::Mutation::new(
                                ts - 1,
                                ts + k as i32,
                                s,
                                q,
                            ));
                            local_seq.push_str(bases);
                            local_qual.push_str(q);
                            ts += k as i32;
                            qs += k;
                            remaining -= k as u32;
                        }
                    }
                }
            }
            CigarOp::Ins(n) => {
                let (s, q) = slice_query(rec, qs, n as usize).ok_or_else(overrun)?;
                mutations.push(crate::model::Mutation::new(ts - 1, ts, s, q));
                qs += n as usize;
            }
            CigarOp::Del(n) => {
                let bases = md.take_deletion(n).ok_or_else(|| mismatch("D"))?;
                mutations.push(crate::model::Mutation::new(ts - 1, ts + n as i32, "", ""));
                local_seq.push_str(bases);
                local_qual.push_str(&"!".repeat(n as usize));
                ts += n as i32;
            }
            CigarOp::RefSkip(n) => {
                // MD carries no bases for skipped reference; pad the
                // reconstructed view
                local_seq.push_str(&"N".repeat(n as usize));
                local_qual.push_str(&"!".repeat(n as usize));
                ts += n as i32;
            }
            CigarOp::SoftClip(n) => {
                qs += n as usize;
            }
            CigarOp::HardClip(_) | CigarOp::Pad(_) => {}
        }
    }

    if !md.exhausted() {
        return Err(mismatch("end"));
    }

    let mut read = Read::new(&rec.id, rec.pos, ts - 1);
    debug_assert_eq!(local_seq.len(), read.len());
    read.seq = local_seq;
    read.qual = local_qual;
    read.mapped_depth = BitVec::new_fill(true, read.len() as u64);
    read.depth = BitVec::new_fill(true, read.len() as u64);
    read.count = BitVec::new_fill(false, read.len() as u64);
    read.mutations = mutations;
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mutation;

    fn record(pos1: u32, cigar: &str, seq: &str, qual: &str, md: &str) -> SamRecord {
        SamRecord::parse(&format!(
            "r1\t0\tRNA1\t{}\t60\t{}\t*\t0\t0\t{}\t{}\tMD:Z:{}",
            pos1, cigar, seq, qual, md
        ))
        .unwrap()
    }

    #[test]
    fn test_walk_all_match() {
        let rec = record(1, "16M", "AATTGGCCATGCCGTA", "HHHHHHHHHHHHHHHH", "16");
        let read = locate_read(&rec, 30).unwrap();
        assert_eq!(read.left, 0);
        assert_eq!(read.right, 15);
        assert_eq!(read.seq, "AATTGGCCATGCCGTA");
        assert_eq!(read.qual, "HHHHHHHHHHHHHHHH");
        assert!(read.mutations.is_empty());
    }

    #[test]
    fn test_walk_mismatch_reconstructs_reference() {
        // read disagrees at position 3 (read base G over reference T)
        let rec = record(1, "8M", "AATGGGCC", "HHHHHHHH", "3T4");
        let read = locate_read(&rec, 30).unwrap();
        assert_eq!(read.seq, "AATTGGCC");
        assert_eq!(
            read.mutations,
            vec![Mutation::new(2, 4, "G", "H")]
        );
    }

    #[test]
    fn test_walk_deletion() {
        let rec = record(1, "3M2D3M", "AATGCC", "HHHHHH", "3^TG3");
        let read = locate_read(&rec, 30).unwrap();
        assert_eq!(read.seq, "AATTGGCC");
        assert_eq!(read.qual, "HHH!!HHH");
        assert_eq!(read.mutations, vec![Mutation::new(2, 5, "", "")]);
    }

    #[test]
    fn test_walk_insertion() {
        let rec = record(1, "4M2I4M", "AATTCAGGCC", "HHHHIJHHHH", "8");
        let read = locate_read(&rec, 30).unwrap();
        assert_eq!(read.seq, "AATTGGCC");
        assert_eq!(read.mutations, vec![Mutation::new(3, 4, "CA", "IJ")]);
    }

    #[test]
    fn test_walk_soft_clips_do_not_move_target() {
        let rec = record(3, "2S4M2S", "TTAATTGG", "HHHHHHHH", "4");
        let read = locate_read(&rec, 30).unwrap();
        assert_eq!(read.left, 2);
        assert_eq!(read.right, 5);
        assert_eq!(read.seq, "AATT");
    }

    #[test]
    fn test_walk_md_cigar_disagreement() {
        // MD deletion length disagrees with the CIGAR D op
        let rec = record(1, "3M2D3M", "AATGCC", "HHHHHH", "3^T3");
        assert!(matches!(
            locate_read(&rec, 30),
            Err(Error::MdCigarMismatch { .. })
        ));
    }

    #[test]
    fn test_low_mapq_keeps_span_only() {
        let rec = record(5, "8M", "AATTGGCC", "HHHHHHHH", "8");
        let mut low = rec.clone();
        low.mapq = 10;
        let read = locate_read(&low, 30).unwrap();
        assert_eq!(read.mapping_category, MappingCategory::LowMapq);
        assert_eq!((read.left, read.right), (4, 11));
        assert!(read.mutations.is_empty());
        assert!(read.seq.is_empty());
    }

    #[test]
    fn test_same_span_reads_reconstruct_identical_reference() {
        // one read all-match, one with a mismatch and a deletion; the
        // reconstructed reference must agree byte for byte
        let a = locate_read(&record(1, "8M", "AATTGGCC", "HHHHHHHH", "8"), 30).unwrap();
        let b = locate_read(&record(1, "3M1D4M", "AATGGCC", "HHHHHHH", "3^T4"), 30).unwrap();
        assert_eq!(a.seq, b.seq);
    }
}
