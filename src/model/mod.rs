// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Shared data model: mutations, mutation classes, processed reads, and the
//! tab-separated interchange format between the per-read processor and the
//! scanning counter.

use std::fmt;

use bv::{BitVec, Bits, BitsMut};
use itertools::Itertools;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, EnumVariantNames, IntoStaticStr};

use crate::errors::Error;

/// Closed set of mutation classes. The variant order is the on-disk column
/// order of the per-position count table and must not be reordered.
#[derive(
    Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumString,
    IntoStaticStr,
    EnumVariantNames,
    Serialize,
    Deserialize,
)]
pub enum MutationClass {
    #[strum(serialize = "A-")]
    DelA,
    #[strum(serialize = "T-")]
    DelT,
    #[strum(serialize = "G-")]
    DelG,
    #[strum(serialize = "C-")]
    DelC,
    #[strum(serialize = "-A")]
    InsA,
    #[strum(serialize = "-T")]
    InsT,
    #[strum(serialize = "-G")]
    InsG,
    #[strum(serialize = "-C")]
    InsC,
    #[strum(serialize = "-N")]
    InsN,
    #[strum(serialize = "AT")]
    MismatchAT,
    #[strum(serialize = "AG")]
    MismatchAG,
    #[strum(serialize = "AC")]
    MismatchAC,
    #[strum(serialize = "TA")]
    MismatchTA,
    #[strum(serialize = "TG")]
    MismatchTG,
    #[strum(serialize = "TC")]
    MismatchTC,
    #[strum(serialize = "GA")]
    MismatchGA,
    #[strum(serialize = "GT")]
    MismatchGT,
    #[strum(serialize = "GC")]
    MismatchGC,
    #[strum(serialize = "CA")]
    MismatchCA,
    #[strum(serialize = "CT")]
    MismatchCT,
    #[strum(serialize = "CG")]
    MismatchCG,
    #[strum(serialize = "multinuc_deletion")]
    MultinucDeletion,
    #[strum(serialize = "multinuc_insertion")]
    MultinucInsertion,
    #[strum(serialize = "multinuc_mismatch")]
    MultinucMismatch,
    #[strum(serialize = "complex_deletion")]
    ComplexDeletion,
    #[strum(serialize = "complex_insertion")]
    ComplexInsertion,
    #[strum(serialize = "N_match")]
    NMatch,
}

impl MutationClass {
    /// All classes in canonical column order.
    pub fn all() -> impl Iterator<Item = MutationClass> {
        MutationClass::iter()
    }

    /// Index into per-tag count maps.
    pub fn ordinal(self) -> usize {
        MutationClass::iter().position(|c| c == self).unwrap()
    }

    pub fn simple_deletion(ref_base: u8) -> Option<MutationClass> {
        match ref_base {
            b'A' => Some(MutationClass::DelA),
            b'T' => Some(MutationClass::DelT),
            b'G' => Some(MutationClass::DelG),
            b'C' => Some(MutationClass::DelC),
            _ => None,
        }
    }

    pub fn simple_insertion(read_base: u8) -> Option<MutationClass> {
        match read_base {
            b'A' => Some(MutationClass::InsA),
            b'T' => Some(MutationClass::InsT),
            b'G' => Some(MutationClass::InsG),
            b'C' => Some(MutationClass::InsC),
            b'N' => Some(MutationClass::InsN),
            _ => None,
        }
    }

    pub fn mismatch(ref_base: u8, read_base: u8) -> Option<MutationClass> {
        match (ref_base, read_base) {
            (b'A', b'T') => Some(MutationClass::MismatchAT),
            (b'A', b'G') => Some(MutationClass::MismatchAG),
            (b'A', b'C') => Some(MutationClass::MismatchAC),
            (b'T', b'A') => Some(MutationClass::MismatchTA),
            (b'T', b'G') => Some(MutationClass::MismatchTG),
            (b'T', b'C') => Some(MutationClass::MismatchTC),
            (b'G', b'A') => Some(MutationClass::MismatchGA),
            (b'G', b'T') => Some(MutationClass::MismatchGT),
            (b'G', b'C') => Some(MutationClass::MismatchGC),
            (b'C', b'A') => Some(MutationClass::MismatchCA),
            (b'C', b'T') => Some(MutationClass::MismatchCT),
            (b'C', b'G') => Some(MutationClass::MismatchCG),
            _ => None,
        }
    }
}

/// Mutation-class restriction for `--use-only-mutation-type`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumVariantNames, Serialize, Deserialize,
)]
pub enum MutationTypeFilter {
    #[strum(serialize = "mismatch")]
    Mismatch,
    #[strum(serialize = "gap")]
    Gap,
    #[strum(serialize = "insert")]
    Insert,
    #[strum(serialize = "gap_multi")]
    GapMulti,
    #[strum(serialize = "insert_multi")]
    InsertMulti,
    #[strum(serialize = "complex")]
    Complex,
}

impl MutationTypeFilter {
    pub fn matches(self, class: MutationClass) -> bool {
        use MutationClass::*;
        match self {
            MutationTypeFilter::Mismatch => match class {
                MismatchAT | MismatchAG | MismatchAC | MismatchTA | MismatchTG | MismatchTC
                | MismatchGA | MismatchGT | MismatchGC | MismatchCA | MismatchCT | MismatchCG
                | MultinucMismatch => true,
                _ => false,
            },
            MutationTypeFilter::Gap => match class {
                DelA | DelT | DelG | DelC => true,
                _ => false,
            },
            MutationTypeFilter::Insert => match class {
                InsA | InsT | InsG | InsC | InsN => true,
                _ => false,
            },
            MutationTypeFilter::GapMulti => class == MultinucDeletion,
            MutationTypeFilter::InsertMulti => class == MultinucInsertion,
            MutationTypeFilter::Complex => class == ComplexDeletion || class == ComplexInsertion,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum ReadType {
    #[strum(serialize = "PAIRED_R1")]
    PairedR1,
    #[strum(serialize = "PAIRED_R2")]
    PairedR2,
    #[strum(serialize = "UNPAIRED_R1")]
    UnpairedR1,
    #[strum(serialize = "UNPAIRED_R2")]
    UnpairedR2,
    #[strum(serialize = "UNPAIRED")]
    Unpaired,
    #[strum(serialize = "MERGED")]
    Merged,
    #[strum(serialize = "PAIRED")]
    Paired,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum MappingCategory {
    #[strum(serialize = "INCLUDED")]
    Included,
    #[strum(serialize = "LOW_MAPQ")]
    LowMapq,
    #[strum(serialize = "OFF_TARGET")]
    OffTarget,
    #[strum(serialize = "UNMAPPED")]
    Unmapped,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
pub enum Strand {
    #[strum(serialize = "+")]
    Forward,
    #[strum(serialize = "-")]
    Reverse,
    #[strum(serialize = ".")]
    Unspecified,
}

/// One deviation of a read from the reference.
///
/// `left` is the last unchanged reference position before the event, `right`
/// the first unchanged position after it; `seq`/`qual` hold the read's
/// replacement bases and their PHRED+33 scores. An event whose replacement
/// length differs from the enclosed span is either an indel with merged
/// alternative placements (`ambig`, recorded by the ambiguity resolver) or a
/// composite event.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub left: i32,
    pub right: i32,
    pub seq: String,
    pub qual: String,
    pub tag: Option<MutationClass>,
    pub ambig: bool,
}

impl Mutation {
    pub fn new(left: i32, right: i32, seq: &str, qual: &str) -> Self {
        Mutation {
            left,
            right,
            seq: seq.to_owned(),
            qual: qual.to_owned(),
            tag: None,
            ambig: false,
        }
    }

    /// Number of reference positions replaced by `seq`.
    pub fn span(&self) -> i32 {
        self.right - self.left - 1
    }

    /// A deletion with a single fixed placement.
    pub fn is_simple_gap(&self) -> bool {
        self.seq.is_empty()
    }

    /// An insertion with a single fixed placement.
    pub fn is_simple_insert(&self) -> bool {
        self.span() == 0 && !self.seq.is_empty()
    }

    /// Whether this event was derived from an ambiguously placed indel;
    /// structural, set by the ambiguity resolver.
    pub fn is_ambiguous(&self) -> bool {
        self.ambig
    }

    /// An insertion anchor (no replaced reference positions) regardless of
    /// whether placements were merged.
    pub fn is_insertion_shaped(&self) -> bool {
        self.seq.len() as i32 > self.span()
    }

    /// A read `N` aligned to a reference base. Never merged with other
    /// mutations and never attributed to counts.
    pub fn is_n_match(&self) -> bool {
        !self.seq.is_empty()
            && self.seq.len() as i32 == self.span()
            && self.seq.bytes().all(|b| b == b'N')
    }

    /// Tag label as written to the interchange format; ambiguous mutations
    /// carry an `_ambig` suffix.
    pub fn tag_label(&self) -> String {
        let base: &str = match self.tag {
            Some(tag) => tag.into(),
            None => "",
        };
        if self.ambig && !base.is_empty() {
            format!("{}_ambig", base)
        } else {
            base.to_owned()
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} \"{}\" \"{}\" \"{}\"",
            self.left,
            self.right,
            self.seq,
            self.qual,
            self.tag_label()
        )
    }
}

/// A processed observation: the read's mapped span, its reconstructed local
/// reference (`seq`), its basecall qualities projected onto reference
/// coordinates (`qual`, `!` where the read contributes no base, `~` at
/// mate-pair holes), its mutations, and the per-position bitmaps feeding the
/// scanning counter.
#[derive(Debug, Clone)]
pub struct Read {
    pub id: String,
    pub read_type: ReadType,
    pub strand: Strand,
    pub mapping_category: MappingCategory,
    /// Index of the associated primer pair, or -1.
    pub primer_pair: i32,
    pub left: i32,
    pub right: i32,
    pub seq: String,
    pub qual: String,
    pub mapped_depth: BitVec,
    pub depth: BitVec,
    pub count: BitVec,
    pub mutations: Vec<Mutation>,
}

impl Read {
    pub fn new(id: &str, left: i32, right: i32) -> Self {
        let len = if right >= left {
            (right - left + 1) as u64
        } else {
            0
        };
        Read {
            id: id.to_owned(),
            read_type: ReadType::Unpaired,
            strand: Strand::Unspecified,
            mapping_category: MappingCategory::Included,
            primer_pair: -1,
            left,
            right,
            seq: String::new(),
            qual: String::new(),
            mapped_depth: BitVec::new_fill(false, len),
            depth: BitVec::new_fill(false, len),
            count: BitVec::new_fill(false, len),
            mutations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        if self.right >= self.left {
            (self.right - self.left + 1) as usize
        } else {
            0
        }
    }

    /// Index of reference position `pos` into the local arrays, if covered.
    pub fn offset(&self, pos: i32) -> Option<usize> {
        if pos >= self.left && pos <= self.right {
            Some((pos - self.left) as usize)
        } else {
            None
        }
    }

    /// Reference base at `pos`, if covered.
    pub fn ref_base(&self, pos: i32) -> Option<u8> {
        self.offset(pos).and_then(|i| self.seq.as_bytes().get(i).copied())
    }

    /// Basecall quality character at reference position `pos`, if covered.
    pub fn qual_at(&self, pos: i32) -> Option<u8> {
        self.offset(pos).and_then(|i| self.qual.as_bytes().get(i).copied())
    }

    /// Serialize into the one-line interchange format consumed by the
    /// scanning counter.
    pub fn to_parsed_line(&self) -> String {
        let mutations = self.mutations.iter().map(|m| m.to_string()).join(" ");
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.read_type,
            self.id,
            self.left,
            self.right,
            self.mapping_category,
            self.primer_pair,
            bits_to_string(&self.mapped_depth),
            bits_to_string(&self.depth),
            bits_to_string(&self.count),
            mutations
        )
    }

    /// Parse a line of the interchange format back into a `Read`. The local
    /// reference and qualities are not part of the format and stay empty.
    pub fn from_parsed_line(line: &str) -> Result<Self, Error> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 10 {
            return Err(Error::IncompleteRecord {
                id: fields.get(1).cloned().unwrap_or("?").to_owned(),
            });
        }
        let id = fields[1].to_owned();
        let incomplete = || Error::IncompleteRecord { id: id.clone() };
        let read_type: ReadType = fields[0].parse().map_err(|_| incomplete())?;
        let left: i32 = fields[2].parse().map_err(|_| incomplete())?;
        let right: i32 = fields[3].parse().map_err(|_| incomplete())?;
        let mapping_category: MappingCategory = fields[4].parse().map_err(|_| incomplete())?;
        let primer_pair: i32 = fields[5].parse().map_err(|_| incomplete())?;

        let mut read = Read::new(&id, left, right);
        read.read_type = read_type;
        read.mapping_category = mapping_category;
        read.primer_pair = primer_pair;
        read.mapped_depth = bits_from_string(fields[6]);
        read.depth = bits_from_string(fields[7]);
        read.count = bits_from_string(fields[8]);
        read.mutations = parse_mutation_fields(fields[9], &id)?;
        Ok(read)
    }
}

fn bits_to_string(bits: &BitVec) -> String {
    (0..bits.len())
        .map(|i| if bits.get_bit(i) { '1' } else { '0' })
        .collect()
}

fn bits_from_string(s: &str) -> BitVec {
    let mut bits = BitVec::new_fill(false, s.len() as u64);
    for (i, c) in s.chars().enumerate() {
        if c == '1' {
            bits.set_bit(i as u64, true);
        }
    }
    bits
}

fn parse_mutation_fields(field: &str, id: &str) -> Result<Vec<Mutation>, Error> {
    let tokens: Vec<&str> = field.split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    if tokens.len() % 5 != 0 {
        return Err(Error::FieldsSize {
            id: id.to_owned(),
            n: tokens.len(),
        });
    }
    let incomplete = || Error::IncompleteRecord { id: id.to_owned() };
    let unquote = |t: &str| t.trim_matches('"').to_owned();
    let mut mutations = Vec::with_capacity(tokens.len() / 5);
    for chunk in tokens.chunks(5) {
        let left: i32 = chunk[0].parse().map_err(|_| incomplete())?;
        let right: i32 = chunk[1].parse().map_err(|_| incomplete())?;
        let mut mutation = Mutation::new(left, right, &unquote(chunk[2]), &unquote(chunk[3]));
        let label = unquote(chunk[4]);
        let (label, ambig) = match label.strip_suffix("_ambig") {
            Some(stripped) => (stripped.to_owned(), true),
            None => (label, false),
        };
        mutation.ambig = ambig;
        if !label.is_empty() {
            mutation.tag = Some(label.parse().map_err(|_| incomplete())?);
        }
        mutations.push(mutation);
    }
    Ok(mutations)
}
