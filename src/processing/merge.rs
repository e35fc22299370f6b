//! Mate-pair merging. The merged read spans the union of both mates; regions
//! covered by a single mate are taken verbatim, overlap regions position by
//! position from the higher-quality mate, and conflicting mutation groups
//! are resolved by mean group quality.

use bv::{BitVec, BitsMut};

use crate::model::{Mutation, Read, ReadType};

/// Merge two located mates into one union read.
pub fn merge_mates(r1: &Read, r2: &Read) -> Read {
    let left = r1.left.min(r2.left);
    let right = r1.right.max(r2.right);
    let len = (right - left + 1) as usize;

    // mate-pair holes keep `_`/`~` markers and zero mapped depth
    let mut seq = vec![b'_'; len];
    let mut qual = vec![b'~'; len];
    let mut mapped = BitVec::new_fill(false, len as u64);

    for p in left..=right {
        let i = (p - left) as usize;
        match (sample(r1, p), sample(r2, p)) {
            (Some((s1, q1)), Some((_, q2))) if q1 >= q2 => {
                seq[i] = s1;
                qual[i] = q1;
            }
            (_, Some((s2, q2))) => {
                seq[i] = s2;
                qual[i] = q2;
            }
            (Some((s1, q1)), None) => {
                seq[i] = s1;
                qual[i] = q1;
            }
            (None, None) => continue,
        }
        mapped.set_bit(i as u64, true);
    }

    // cluster mutations of both mates into overlap groups, then keep each
    // group from the mate with the better mean quality
    let mut mutations = Vec::new();
    let groups = cluster_mutations(r1, r2);
    for group in &groups {
        let span = group_span(group);
        let r1_muts: Vec<&Mutation> = group.iter().filter(|(m1, _)| *m1).map(|(_, m)| m).collect();
        let r2_muts: Vec<&Mutation> = group.iter().filter(|(m1, _)| !*m1).map(|(_, m)| m).collect();

        let conflict = (!r1_muts.is_empty() && overlaps(r2, span))
            || (!r2_muts.is_empty() && overlaps(r1, span));
        let winner_is_r1 = if !conflict {
            !r1_muts.is_empty()
        } else {
            group_quality(r1, span, &r1_muts) >= group_quality(r2, span, &r2_muts)
        };

        let winning = if winner_is_r1 { &r1_muts } else { &r2_muts };
        for m in winning {
            mutations.push((*m).clone());
        }
        // the winner also supplies the merged basecalls over the group span,
        // so the losing mate's disagreeing bases drop out of effective depth
        let source = if winner_is_r1 { r1 } else { r2 };
        for p in span.0.max(left)..=span.1.min(right) {
            if let Some((s, q)) = sample(source, p) {
                let i = (p - left) as usize;
                seq[i] = s;
                qual[i] = q;
            }
        }
    }
    mutations.sort_by_key(|m| (m.left, m.right));

    let mut read = Read::new(&r1.id, left, right);
    read.read_type = ReadType::Merged;
    read.strand = r1.strand;
    read.mapping_category = r1.mapping_category;
    read.seq = String::from_utf8(seq).unwrap();
    read.qual = String::from_utf8(qual).unwrap();
    read.depth = mapped.clone();
    read.mapped_depth = mapped;
    read.count = BitVec::new_fill(false, len as u64);
    read.mutations = mutations;
    read
}

fn sample(read: &Read, pos: i32) -> Option<(u8, u8)> {
    let i = read.offset(pos)?;
    Some((read.seq.as_bytes()[i], read.qual.as_bytes()[i]))
}

fn overlaps(read: &Read, span: (i32, i32)) -> bool {
    span.0 <= read.right && span.1 >= read.left
}

/// All mutations of both mates, grouped transitively by `[left, right]`
/// interval overlap. Each element records the owning mate.
fn cluster_mutations(r1: &Read, r2: &Read) -> Vec<Vec<(bool, Mutation)>> {
    let mut all: Vec<(bool, Mutation)> = r1
        .mutations
        .iter()
        .map(|m| (true, m.clone()))
        .chain(r2.mutations.iter().map(|m| (false, m.clone())))
        .collect();
    all.sort_by_key(|(_, m)| (m.left, m.right));

    let mut groups: Vec<Vec<(bool, Mutation)>> = Vec::new();
    for entry in all {
        let joins = groups
            .last()
            .map_or(false, |group| entry.1.left <= group_span(group).1);
        if joins {
            groups.last_mut().unwrap().push(entry);
        } else {
            groups.push(vec![entry]);
        }
    }
    groups
}

fn group_span(group: &[(bool, Mutation)]) -> (i32, i32) {
    let left = group.iter().map(|(_, m)| m.left).min().unwrap();
    let right = group.iter().map(|(_, m)| m.right).max().unwrap();
    (left, right)
}

/// Mean PHRED over a group's bases plus one-base flanks in one mate. A mate
/// without mutations in the group is scored on its basecalls across the
/// span, i.e. on its implicit claim that the reference is correct there.
fn group_quality(read: &Read, span: (i32, i32), muts: &[&Mutation]) -> f64 {
    let mut scores: Vec<u8> = Vec::new();
    if muts.is_empty() {
        for p in span.0..=span.1 {
            if let Some(q) = read.qual_at(p) {
                scores.push(q);
            }
        }
    } else {
        for m in muts {
            scores.extend(m.qual.bytes());
        }
        for p in &[span.0, span.1] {
            if let Some(q) = read.qual_at(*p) {
                scores.push(q);
            }
        }
    }
    if scores.is_empty() {
        return 0.0;
    }
    scores
        .iter()
        .map(|&q| q.saturating_sub(33) as f64)
        .sum::<f64>()
        / scores.len() as f64
}
