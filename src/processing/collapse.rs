//! Coalescing of nearby mutations and stripping of spurious matching flanks.

use crate::model::{Mutation, Read};
use crate::pipeline::Settings;

/// Merge mutations separated by at most `max_internal_match` unchanged
/// reference bases into single events, then strip matching bases from the
/// ends of the results. Never merges across a mate-pair hole or into an
/// `N_match` pseudo-mutation. Skipped entirely in variant mode, where
/// adjacent SNPs must stay distinct observations.
pub fn collapse_adjacent(read: &mut Read, settings: &Settings) {
    if settings.variant_mode() {
        return;
    }
    let max_internal_match = settings.max_internal_match();
    read.mutations.sort_by_key(|m| (m.left, m.right));
    let mut merged: Vec<Mutation> = Vec::with_capacity(read.mutations.len());
    for m in read.mutations.drain(..) {
        let mergeable = match merged.last() {
            Some(last) => {
                let between = m.left - last.right + 1;
                between <= max_internal_match as i32
                    && !last.is_n_match()
                    && !m.is_n_match()
                    && !hole_between(read.left, &read.seq, last.right, m.left)
            }
            None => false,
        };
        if mergeable {
            let last = merged.last_mut().unwrap();
            // carry the unchanged reference bases between the two events
            for p in last.right..=m.left {
                let i = (p - read.left) as usize;
                last.seq.push(read.seq.as_bytes()[i] as char);
                last.qual.push(read.qual.as_bytes()[i] as char);
            }
            last.seq.push_str(&m.seq);
            last.qual.push_str(&m.qual);
            last.right = m.right;
            last.ambig |= m.ambig;
        } else {
            merged.push(m);
        }
    }
    for m in &mut merged {
        strip_matching_flanks(m, read.left, &read.seq);
    }
    merged.retain(|m| !m.seq.is_empty() || m.span() > 0);
    read.mutations = merged;
}

fn hole_between(read_left: i32, ref_seq: &str, lo: i32, hi: i32) -> bool {
    (lo..=hi).any(|p| {
        let i = p - read_left;
        i < 0 || i as usize >= ref_seq.len() || ref_seq.as_bytes()[i as usize] == b'_'
    })
}

/// A shifted or collapsed event can acquire flanking replacement bases that
/// equal the reference; trim them back so bounds stay tight. Ambiguous spans
/// are left alone: their flanks equal the reference by construction.
fn strip_matching_flanks(m: &mut Mutation, read_left: i32, ref_seq: &str) {
    if m.ambig || m.is_n_match() {
        return;
    }
    let ref_at = |pos: i32| -> Option<u8> {
        let i = pos - read_left;
        if i < 0 || i as usize >= ref_seq.len() {
            None
        } else {
            Some(ref_seq.as_bytes()[i as usize])
        }
    };
    while m.span() >= 1
        && !m.seq.is_empty()
        && ref_at(m.left + 1) == Some(m.seq.as_bytes()[0])
    {
        m.left += 1;
        m.seq.remove(0);
        m.qual.remove(0);
    }
    while m.span() >= 1
        && !m.seq.is_empty()
        && ref_at(m.right - 1) == Some(*m.seq.as_bytes().last().unwrap())
    {
        m.right -= 1;
        m.seq.pop();
        m.qual.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::pipeline::SettingsBuilder;

    fn settings(max_internal_match: u32) -> Settings {
        SettingsBuilder::default()
            .max_internal_match(max_internal_match)
            .build()
            .unwrap()
    }

    fn read_with(seq: &str, mutations: Vec<Mutation>) -> Read {
        let mut read = Read::new("r", 0, seq.len() as i32 - 1);
        read.seq = seq.to_owned();
        read.qual = "H".repeat(seq.len());
        read.mutations = mutations;
        read
    }

    #[test]
    fn test_collapse_nearby_mutations() {
        // mismatch at 2 and deletion of 5, two unchanged bases apart
        let mut read = read_with(
            "AATTGGCCAT",
            vec![Mutation::new(1, 3, "C", "I"), Mutation::new(4, 6, "", "")],
        );
        collapse_adjacent(&mut read, &settings(3));
        assert_eq!(read.mutations.len(), 1);
        let m = &read.mutations[0];
        // coalesced to (1, 6, "CTG"), then the matching G flank is stripped
        assert_eq!((m.left, m.right), (1, 5));
        assert_eq!(m.seq, "CT");
        assert_eq!(m.qual, "IH");
    }

    #[test]
    fn test_collapse_respects_limit() {
        let mut read = read_with(
            "AATTGGCCAT",
            vec![Mutation::new(1, 3, "C", "I"), Mutation::new(6, 8, "A", "I")],
        );
        collapse_adjacent(&mut read, &settings(3));
        assert_eq!(read.mutations.len(), 2);
    }

    #[test]
    fn test_no_merge_across_hole() {
        let mut read = read_with(
            "AATT__CCAT",
            vec![Mutation::new(1, 3, "C", "I"), Mutation::new(6, 8, "A", "I")],
        );
        collapse_adjacent(&mut read, &settings(10));
        assert_eq!(read.mutations.len(), 2);
    }

    #[test]
    fn test_no_merge_with_n_match() {
        let mut read = read_with(
            "AATTGGCCAT",
            vec![Mutation::new(1, 3, "N", "I"), Mutation::new(4, 6, "", "")],
        );
        collapse_adjacent(&mut read, &settings(5));
        assert_eq!(read.mutations.len(), 2);
    }

    #[test]
    fn test_strip_matching_flanks() {
        // replacement TGC over span 3..?: T and C equal the reference flanks
        let mut read = read_with(
            "AATTGGCCAT",
            vec![Mutation::new(2, 8, "TACC", "HHHH")],
        );
        collapse_adjacent(&mut read, &settings(0));
        assert_eq!(read.mutations.len(), 1);
        let m = &read.mutations[0];
        assert_eq!((m.left, m.right), (3, 6));
        assert_eq!(m.seq, "A");
    }

    #[test]
    fn test_variant_mode_disables_merging() {
        let mut read = read_with(
            "AATTGGCCAT",
            vec![Mutation::new(1, 3, "C", "I"), Mutation::new(2, 4, "G", "I")],
        );
        let settings = SettingsBuilder::default()
            .max_internal_match(7)
            .variant_mode(true)
            .build()
            .unwrap();
        collapse_adjacent(&mut read, &settings);
        assert_eq!(read.mutations.len(), 2);
    }

    #[test]
    fn test_merge_bound_holds_after_collapse() {
        let mut read = read_with(
            "AATTGGCCATGCCGTA",
            vec![
                Mutation::new(0, 2, "C", "I"),
                Mutation::new(3, 5, "C", "I"),
                Mutation::new(9, 11, "A", "I"),
            ],
        );
        collapse_adjacent(&mut read, &settings(2));
        for pair in read.mutations.windows(2) {
            let between = pair[1].left - pair[0].right + 1;
            assert!(between > 2);
        }
    }
}
