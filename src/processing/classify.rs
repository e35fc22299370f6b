//! Mutation classification against the reconstructed local reference.

use crate::errors::Error;
use crate::model::{Mutation, MutationClass, Read};

/// Assign a class tag to every mutation of `read`. A mutation that indexes
/// outside the local reference cannot be classified and is dropped; the
/// condition is recovered per mutation, never fatal.
pub fn classify_mutations(read: &mut Read) {
    let left = read.left;
    let seq = read.seq.clone();
    let id = read.id.clone();
    read.mutations.retain_mut(|m| match classify_one(m, left, &seq) {
        Some(tag) => {
            m.tag = Some(tag);
            true
        }
        None => {
            debug!(
                "dropped: {}",
                Error::OutOfRangeMutation {
                    id: id.clone(),
                    left: m.left,
                    right: m.right,
                }
            );
            false
        }
    });
}

fn classify_one(m: &Mutation, read_left: i32, ref_seq: &str) -> Option<MutationClass> {
    let ref_at = |pos: i32| -> Option<u8> {
        let i = pos - read_left;
        if i < 0 || i as usize >= ref_seq.len() {
            None
        } else {
            Some(ref_seq.as_bytes()[i as usize])
        }
    };
    let span = m.span();
    let len = m.seq.len() as i32;

    if m.is_n_match() {
        return Some(MutationClass::NMatch);
    }
    if len == span {
        // pure mismatch
        if span == 1 {
            let ref_base = ref_at(m.left + 1)?;
            let read_base = m.seq.as_bytes()[0];
            return MutationClass::mismatch(ref_base, read_base)
                .or(Some(MutationClass::MultinucMismatch));
        }
        return Some(MutationClass::MultinucMismatch);
    }
    if len == 0 {
        // pure gap
        if span == 1 {
            let ref_base = ref_at(m.left + 1)?;
            return MutationClass::simple_deletion(ref_base)
                .or(Some(MutationClass::MultinucDeletion));
        }
        return Some(MutationClass::MultinucDeletion);
    }
    if span == 0 {
        // pure insert
        if len == 1 {
            return MutationClass::simple_insertion(m.seq.as_bytes()[0])
                .or(Some(MutationClass::MultinucInsertion));
        }
        return Some(MutationClass::MultinucInsertion);
    }

    // replacement length disagrees with the span: a merged ambiguous
    // placement (classified by net effect) or a composite event
    if m.is_ambiguous() {
        if len < span {
            let net = span - len;
            if net == 1 {
                // all candidate deleted bases are equal within the span
                let ref_base = ref_at(m.left + 1)?;
                return MutationClass::simple_deletion(ref_base)
                    .or(Some(MutationClass::MultinucDeletion));
            }
            return Some(MutationClass::MultinucDeletion);
        }
        let net = len - span;
        if net == 1 {
            return MutationClass::simple_insertion(*m.seq.as_bytes().last().unwrap())
                .or(Some(MutationClass::MultinucInsertion));
        }
        return Some(MutationClass::MultinucInsertion);
    }
    if len < span {
        Some(MutationClass::ComplexDeletion)
    } else {
        Some(MutationClass::ComplexInsertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_with(seq: &str, mutations: Vec<Mutation>) -> Read {
        let mut read = Read::new("r", 0, seq.len() as i32 - 1);
        read.seq = seq.to_owned();
        read.qual = "H".repeat(seq.len());
        read.mutations = mutations;
        read
    }

    fn tag_of(seq: &str, m: Mutation) -> Option<MutationClass> {
        let mut read = read_with(seq, vec![m]);
        classify_mutations(&mut read);
        read.mutations.get(0).and_then(|m| m.tag)
    }

    #[test]
    fn test_classify_simple_shapes() {
        assert_eq!(
            tag_of("AATTGG", Mutation::new(2, 4, "", "")),
            Some(MutationClass::DelT)
        );
        assert_eq!(
            tag_of("AATTGG", Mutation::new(2, 3, "G", "H")),
            Some(MutationClass::InsG)
        );
        assert_eq!(
            tag_of("AATTGG", Mutation::new(2, 4, "C", "H")),
            Some(MutationClass::MismatchTC)
        );
        assert_eq!(
            tag_of("AATTGG", Mutation::new(2, 4, "N", "H")),
            Some(MutationClass::NMatch)
        );
    }

    #[test]
    fn test_classify_multinuc() {
        assert_eq!(
            tag_of("AATTGGCC", Mutation::new(2, 6, "", "")),
            Some(MutationClass::MultinucDeletion)
        );
        assert_eq!(
            tag_of("AATTGGCC", Mutation::new(2, 3, "GT", "HH")),
            Some(MutationClass::MultinucInsertion)
        );
        assert_eq!(
            tag_of("AATTGGCC", Mutation::new(2, 5, "CA", "HH")),
            Some(MutationClass::MultinucMismatch)
        );
    }

    #[test]
    fn test_classify_ambiguous_by_net_effect() {
        let mut m = Mutation::new(1, 4, "G", "H");
        m.ambig = true;
        assert_eq!(tag_of("ATGGAT", m), Some(MutationClass::DelG));

        let mut m = Mutation::new(1, 4, "GGG", "HHH");
        m.ambig = true;
        assert_eq!(tag_of("ATGGAT", m), Some(MutationClass::InsG));
    }

    #[test]
    fn test_classify_complex() {
        assert_eq!(
            tag_of("AATTGGCC", Mutation::new(1, 5, "CT", "HH")),
            Some(MutationClass::ComplexDeletion)
        );
        assert_eq!(
            tag_of("AATTGGCC", Mutation::new(1, 4, "CTG", "HHH")),
            Some(MutationClass::ComplexInsertion)
        );
    }

    #[test]
    fn test_out_of_range_mutation_is_dropped() {
        let mut read = read_with("AATT", vec![Mutation::new(7, 9, "", "")]);
        classify_mutations(&mut read);
        assert!(read.mutations.is_empty());
    }
}
