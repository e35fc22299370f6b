use crate::errors::Error;
use crate::sam::cigar::{self, CigarOp};
use crate::sam::md::{self, MdOp};

const FLAG_PAIRED: u16 = 0x1;
const FLAG_PROPER_PAIR: u16 = 0x2;
const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_MATE_UNMAPPED: u16 = 0x8;
const FLAG_REVERSE: u16 = 0x10;
const FLAG_MATE_REVERSE: u16 = 0x20;
const FLAG_FIRST_IN_PAIR: u16 = 0x40;
const FLAG_SECOND_IN_PAIR: u16 = 0x80;

/// One parsed alignment record.
///
/// Coordinates are converted to 0-based on parse. The CIGAR string and the
/// MD tag are tokenized eagerly; `md` is `None` only for unmapped records
/// (mapped records without MD are rejected as `IncompleteRecord`).
#[derive(Debug, Clone)]
pub struct SamRecord {
    pub id: String,
    pub flags: u16,
    pub rname: String,
    /// 0-based leftmost mapped position.
    pub pos: i32,
    pub mapq: u8,
    pub cigar: Vec<CigarOp>,
    pub seq: String,
    pub qual: String,
    pub md: Option<Vec<MdOp>>,
}

impl SamRecord {
    pub fn parse(line: &str) -> Result<Self, Error> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            return Err(Error::IncompleteRecord {
                id: fields.get(0).cloned().unwrap_or("?").to_owned(),
            });
        }
        let id = fields[0].to_owned();
        let incomplete = || Error::IncompleteRecord { id: id.clone() };

        let flags: u16 = fields[1].parse().map_err(|_| incomplete())?;
        let rname = fields[2].to_owned();
        let pos: i32 = fields[3].parse::<i32>().map_err(|_| incomplete())? - 1;
        let mapq: u8 = fields[4].parse().map_err(|_| incomplete())?;
        let seq = fields[9].to_ascii_uppercase();
        let qual = fields[10].to_owned();

        let unmapped = rname == "*" || flags & FLAG_UNMAPPED != 0;
        if unmapped {
            return Ok(SamRecord {
                id,
                flags,
                rname,
                pos,
                mapq,
                cigar: Vec::new(),
                seq,
                qual,
                md: None,
            });
        }

        let cigar = cigar::parse_cigar(fields[5], &id)?;
        let md_value = fields[11..]
            .iter()
            .find_map(|f| f.strip_prefix("MD:Z:"))
            .ok_or_else(incomplete)?;
        let md = md::parse_md(md_value, &id)?;

        Ok(SamRecord {
            id,
            flags,
            rname,
            pos,
            mapq,
            cigar,
            seq,
            qual,
            md: Some(md),
        })
    }

    pub fn is_paired(&self) -> bool {
        self.flags & FLAG_PAIRED != 0
    }

    pub fn is_proper_pair(&self) -> bool {
        self.flags & FLAG_PROPER_PAIR != 0
    }

    pub fn is_unmapped(&self) -> bool {
        self.rname == "*" || self.flags & FLAG_UNMAPPED != 0
    }

    pub fn is_mate_unmapped(&self) -> bool {
        self.flags & FLAG_MATE_UNMAPPED != 0
    }

    pub fn is_reverse(&self) -> bool {
        self.flags & FLAG_REVERSE != 0
    }

    pub fn is_mate_reverse(&self) -> bool {
        self.flags & FLAG_MATE_REVERSE != 0
    }

    pub fn is_first_in_pair(&self) -> bool {
        self.flags & FLAG_FIRST_IN_PAIR != 0
    }

    pub fn is_second_in_pair(&self) -> bool {
        self.flags & FLAG_SECOND_IN_PAIR != 0
    }

    /// 0-based rightmost mapped position (inclusive).
    pub fn ref_end(&self) -> i32 {
        self.pos + cigar::reference_span(&self.cigar) - 1
    }
}
