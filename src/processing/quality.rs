//! Basecall-quality filtering and the effective depth/count bitmaps.
//!
//! Positions survive into effective depth only when their own basecall and
//! both immediate neighbours meet the PHRED threshold; mutations survive
//! only when every base inside them and their flanking basecalls do. A
//! retained mutation is attributed to the reference base immediately 3' of
//! the inferred adduct site, `right - 1`.

use bv::BitsMut;

use crate::model::{Mutation, MutationClass, Read};
use crate::pipeline::Settings;

pub fn apply_quality_filter(read: &mut Read, settings: &Settings) {
    let min_qual = settings.min_qual();
    let n = read.len();
    if n == 0 {
        return;
    }

    let quals = read.qual.as_bytes().to_owned();
    // `~` marks a mate-pair hole and always fails
    let fails = |i: usize| -> bool {
        quals[i] == b'~' || quals[i].saturating_sub(33) < min_qual
    };

    // non-mutation positions: a bad basecall poisons itself and both
    // neighbours
    for i in 0..n {
        if fails(i) || (i > 0 && fails(i - 1)) || (i + 1 < n && fails(i + 1)) {
            read.depth.set_bit(i as u64, false);
        }
    }

    // mutations: every base inside plus the flanking basecalls (or the
    // nearest base of an adjacent mutation) must pass
    let all = read.mutations.clone();
    let mut kept = Vec::with_capacity(all.len());
    for m in &all {
        if m.tag == Some(MutationClass::NMatch) {
            kept.push(m.clone());
            continue;
        }
        let mut ok = m
            .qual
            .bytes()
            .all(|q| q != b'~' && q.saturating_sub(33) >= min_qual);
        for &flank in &[m.left, m.right] {
            if let Some(q) = flank_quality(read, &all, m, flank) {
                ok &= q != b'~' && q.saturating_sub(33) >= min_qual;
            }
        }
        if ok {
            kept.push(m.clone());
        } else {
            clear_span(read, m);
        }
    }

    // optional restriction to a single mutation class; removed mutations
    // still blank the depth they covered, mirroring the quality exclusion
    if let Some(filter) = settings.use_only_mutation_type() {
        kept.retain(|m| {
            if m.tag == Some(MutationClass::NMatch) {
                return true;
            }
            match m.tag {
                Some(tag) if filter.matches(tag) => true,
                _ => {
                    clear_span(read, m);
                    false
                }
            }
        });
    }

    // site attribution
    for m in &kept {
        if m.tag == Some(MutationClass::NMatch) {
            continue;
        }
        if settings.variant_mode() {
            for p in m.left + 1..m.right {
                if let Some(i) = read.offset(p) {
                    read.depth.set_bit(i as u64, true);
                }
            }
        } else {
            for p in m.left + 1..m.right - 1 {
                if let Some(i) = read.offset(p) {
                    read.depth.set_bit(i as u64, false);
                }
            }
            if let Some(i) = read.offset(m.right - 1) {
                read.depth.set_bit(i as u64, true);
            }
        }
        if let Some(i) = read.offset(m.right - 1) {
            read.count.set_bit(i as u64, true);
        }
    }

    read.mutations = kept;
}

/// Quality of the flanking basecall at `pos`. When the flank lies inside a
/// neighbouring mutation, that mutation's nearest replacement base answers
/// instead; outside the read there is nothing to check.
fn flank_quality(read: &Read, all: &[Mutation], m: &Mutation, pos: i32) -> Option<u8> {
    for other in all {
        if std::ptr::eq(other, m) {
            continue;
        }
        if other.left < pos && pos < other.right && !other.qual.is_empty() {
            return if pos <= other.left + other.span() / 2 {
                other.qual.bytes().next()
            } else {
                other.qual.bytes().last()
            };
        }
    }
    read.qual_at(pos)
}

fn clear_span(read: &mut Read, m: &Mutation) {
    for p in m.left + 1..m.right {
        if let Some(i) = read.offset(p) {
            read.depth.set_bit(i as u64, false);
        }
    }
}
