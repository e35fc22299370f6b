use thiserror::Error;

/// Failure modes of the mutation-analysis pipeline.
///
/// Per-record parse failures abort the run by default; `OutOfRangeMutation`
/// is recovered locally (the offending mutation is dropped) and only ever
/// reported through the debug trace.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record {id}: fewer than 11 fields or no MD tag")]
    IncompleteRecord { id: String },
    #[error("record {id}: CIGAR string {cigar} cannot be tokenized")]
    MalformedCigar { id: String, cigar: String },
    #[error("record {id}: MD tag {md} cannot be tokenized")]
    MalformedMd { id: String, md: String },
    #[error("record {id}: MD operations disagree with CIGAR at {op}")]
    MdCigarMismatch { id: String, op: String },
    #[error("record {id}: mutation [{left}, {right}] indexes outside the reconstructed local reference")]
    OutOfRangeMutation { id: String, left: i32, right: i32 },
    #[error("serialized read {id}: {n} trailing mutation fields, expected a multiple of five")]
    FieldsSize { id: String, n: usize },
    #[error("no reads mapped to the target; check aligner output and --min-mapq")]
    NoMappedReads,
}
