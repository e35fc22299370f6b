//! Minimal model of aligned records in the tab-separated alignment format:
//! field splitting, flag accessors, and tokenizers for the CIGAR string and
//! the MD tag. Everything downstream works on the tokenized operations.

pub mod cigar;
pub mod md;
pub mod record;

pub use cigar::CigarOp;
pub use md::MdOp;
pub use record::SamRecord;
