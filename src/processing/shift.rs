//! Optional right-alignment of ambiguous indels. The merged placement span
//! produced by the ambiguity resolver is converted back into a placed indel
//! at its rightmost valid position; reference positions matched by the
//! replacement bases become ordinary matches again, and any disagreement
//! among them is re-emitted as a separate mismatch.

use crate::model::{Mutation, Read};
use crate::pipeline::Settings;

pub fn shift_ambiguous(read: &mut Read, settings: &Settings) {
    if settings.variant_mode() {
        return;
    }
    if !settings.right_align_ambig_dels() && !settings.right_align_ambig_ins() {
        return;
    }
    let mutations = std::mem::take(&mut read.mutations);
    let mut shifted = Vec::with_capacity(mutations.len());
    for m in mutations {
        let net_len = m.seq.len() as i32;
        let span = m.span();
        let eligible = m.is_ambiguous()
            && ((net_len < span && settings.right_align_ambig_dels())
                || (net_len > span && span > 0 && settings.right_align_ambig_ins()));
        if !eligible {
            shifted.push(m);
            continue;
        }
        shifted.extend(right_align(&m, read));
    }
    shifted.sort_by_key(|m| (m.left, m.right));
    read.mutations = shifted;
}

fn right_align(m: &Mutation, read: &Read) -> Vec<Mutation> {
    let mut out = Vec::new();
    let span = m.span();
    let net_len = m.seq.len() as i32;
    // number of replacement bases that become plain matches on the left
    let matched = net_len.min(span) as usize;
    for i in 0..matched {
        let pos = m.left + 1 + i as i32;
        let read_base = m.seq.as_bytes()[i];
        if read.ref_base(pos) != Some(read_base) {
            let mut mm = Mutation::new(
                pos - 1,
                pos + 1,
                &m.seq[i..i + 1],
                &m.qual[i..i + 1],
            );
            mm.ambig = true;
            out.push(mm);
        }
    }
    let mut indel = if net_len < span {
        // deletion right-aligned against the end of the span
        Mutation::new(m.left + matched as i32, m.right, "", "")
    } else {
        Mutation::new(m.right - 1, m.right, &m.seq[matched..], &m.qual[matched..])
    };
    indel.ambig = true;
    out.push(indel);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SettingsBuilder;

    fn read_with(seq: &str, mutations: Vec<Mutation>) -> Read {
        let mut read = Read::new("r", 0, seq.len() as i32 - 1);
        read.seq = seq.to_owned();
        read.qual = "H".repeat(seq.len());
        read.mutations = mutations;
        read
    }

    fn settings(dels: bool, ins: bool) -> Settings {
        SettingsBuilder::default()
            .right_align_ambig_dels(dels)
            .right_align_ambig_ins(ins)
            .build()
            .unwrap()
    }

    #[test]
    fn test_right_align_homopolymer_gap() {
        // expanded gap over ATG[GA]T with one retained G
        let mut m = Mutation::new(1, 4, "G", "H");
        m.ambig = true;
        let mut read = read_with("ATGGAT", vec![m]);
        shift_ambiguous(&mut read, &settings(true, false));
        assert_eq!(read.mutations.len(), 1);
        let del = &read.mutations[0];
        assert_eq!((del.left, del.right), (2, 4));
        assert_eq!(del.seq, "");
        assert!(del.is_ambiguous());
    }

    #[test]
    fn test_right_align_insert() {
        let mut m = Mutation::new(1, 4, "GGG", "HHH");
        m.ambig = true;
        let mut read = read_with("ATGGAT", vec![m]);
        shift_ambiguous(&mut read, &settings(false, true));
        assert_eq!(read.mutations.len(), 1);
        let ins = &read.mutations[0];
        assert_eq!((ins.left, ins.right), (3, 4));
        assert_eq!(ins.seq, "G");
    }

    #[test]
    fn test_swallowed_mismatch_reemitted() {
        // replacement bases disagree with the reference at position 2
        let mut m = Mutation::new(1, 4, "C", "H");
        m.ambig = true;
        let mut read = read_with("ATGGAT", vec![m]);
        shift_ambiguous(&mut read, &settings(true, false));
        assert_eq!(read.mutations.len(), 2);
        assert_eq!((read.mutations[0].left, read.mutations[0].right), (1, 3));
        assert_eq!(read.mutations[0].seq, "C");
        assert_eq!((read.mutations[1].left, read.mutations[1].right), (2, 4));
        assert!(read.mutations[1].is_simple_gap());
    }

    #[test]
    fn test_variant_mode_disables_shift() {
        let mut m = Mutation::new(1, 4, "G", "H");
        m.ambig = true;
        let mut read = read_with("ATGGAT", vec![m.clone()]);
        let settings = SettingsBuilder::default()
            .right_align_ambig_dels(true)
            .variant_mode(true)
            .build()
            .unwrap();
        shift_ambiguous(&mut read, &settings);
        assert_eq!(read.mutations, vec![m]);
    }
}
