//! Resolution of ambiguously placed indels. A simple gap or simple insert in
//! a repetitive region is slid one position at a time, right then left, for
//! as long as the slide is a no-op on the alignment; every valid placement is
//! folded into a single mutation whose bounds cover the extreme placements
//! and whose `seq` accumulates the traversed reference bases.

use crate::model::{Mutation, Read};

/// Expand every ambiguously placed simple indel of `read` to its merged
/// placement span and chain indels that come to share reference positions.
/// Idempotent: expanded events are no longer simple and are left alone on a
/// second pass.
pub fn resolve_ambiguous_indels(read: &mut Read) {
    for i in 0..read.mutations.len() {
        if read.mutations[i].is_simple_gap() || read.mutations[i].is_simple_insert() {
            slide_right(read, i);
            slide_left(read, i);
        }
    }
    chain_overlapping(read);
}

/// Reference position `pos` cannot take part in a slide if it falls inside
/// another mutation's changed span, carries an insertion anchor, or marks a
/// mate-pair hole.
fn blocked(read: &Read, skip: usize, pos: i32) -> bool {
    match read.ref_base(pos) {
        None | Some(b'_') => return true,
        _ => {}
    }
    if read.qual_at(pos) == Some(b'~') {
        return true;
    }
    read.mutations.iter().enumerate().any(|(j, m)| {
        j != skip
            && ((m.left < pos && pos < m.right)
                || (m.is_insertion_shaped() && (m.left == pos || m.right == pos)))
    })
}

fn slide_right(read: &mut Read, i: usize) {
    loop {
        let m = &read.mutations[i];
        let pick = m.right;
        if blocked(read, i, pick) {
            return;
        }
        let picked_ref = read.ref_base(pick).unwrap();
        let valid = {
            let m = &read.mutations[i];
            if m.is_insertion_shaped() {
                // rightmost placement anchors the insert at right-1|right;
                // passing the next reference base requires the insert to
                // start with it
                m.seq.as_bytes()[m.span() as usize] == picked_ref
            } else {
                // rightmost placement deletes [right-d, right-1]
                let d = m.span() - m.seq.len() as i32;
                read.ref_base(m.right - d) == Some(picked_ref)
            }
        };
        if !valid {
            return;
        }
        let qual = read.qual_at(pick).unwrap();
        let m = &mut read.mutations[i];
        m.seq.push(picked_ref as char);
        m.qual.push(qual as char);
        m.right += 1;
        m.ambig = true;
    }
}

fn slide_left(read: &mut Read, i: usize) {
    loop {
        let m = &read.mutations[i];
        let pick = m.left;
        if blocked(read, i, pick) {
            return;
        }
        let picked_ref = read.ref_base(pick).unwrap();
        let valid = {
            let m = &read.mutations[i];
            if m.is_insertion_shaped() {
                // leftmost placement anchors the insert at left|left+1
                let n = m.seq.len() as i32 - m.span();
                m.seq.as_bytes()[(n - 1) as usize] == picked_ref
            } else {
                // leftmost placement deletes [left+1, left+d]
                let d = m.span() - m.seq.len() as i32;
                read.ref_base(m.left + d) == Some(picked_ref)
            }
        };
        if !valid {
            return;
        }
        let qual = read.qual_at(pick).unwrap();
        let m = &mut read.mutations[i];
        m.seq.insert(0, picked_ref as char);
        m.qual.insert(0, qual as char);
        m.left -= 1;
        m.ambig = true;
    }
}

/// Merge mutations whose changed spans came to share reference positions
/// after expansion. A mismatch swallowed whole by an expanded indel span is
/// suppressed; two chained indels contribute their replacement bases once
/// over the shared region.
fn chain_overlapping(read: &mut Read) {
    if read.mutations.len() < 2 {
        return;
    }
    read.mutations.sort_by_key(|m| (m.left, m.right));
    let mut merged: Vec<Mutation> = Vec::with_capacity(read.mutations.len());
    for m in read.mutations.drain(..) {
        let overlapping = merged.last().map_or(false, |last| m.left < last.right - 1);
        if overlapping {
            let last = merged.last_mut().unwrap();
            // number of changed positions shared with the previous event
            let shared = (last.right - m.left - 1).max(0) as usize;
            let keep = shared.min(m.seq.len());
            last.seq.push_str(&m.seq[keep..]);
            last.qual.push_str(&m.qual[keep..]);
            last.right = last.right.max(m.right);
            last.ambig |= m.ambig;
        } else {
            merged.push(m);
        }
    }
    read.mutations = merged;
}
