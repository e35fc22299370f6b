// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Pipeline driver: streams alignment records through the mutation locator,
//! the per-read processor and the scanning counter. The optional debug trace
//! sink is threaded through explicitly; there is no process-wide state.

use std::io::{BufRead, Write};

use anyhow::Result;
use bv::BitVec;

use crate::counting::{MutationCounter, VariantCounter};
use crate::errors::Error;
use crate::locate;
use crate::model::{MappingCategory, MutationTypeFilter, Read, ReadType};
use crate::primers::{self, PrimerPair};
use crate::processing;
use crate::sam::SamRecord;

/// All processing knobs. Serialized into the count-table header so a run can
/// be reproduced from its output.
#[derive(Builder, CopyGetters, Clone, Copy, Debug, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct Settings {
    #[builder(default = "30")]
    min_mapq: u8,
    #[builder(default = "30")]
    min_qual: u8,
    #[builder(default = "0")]
    exclude_3prime: u32,
    #[builder(default = "7")]
    max_internal_match: u32,
    #[builder(default)]
    right_align_ambig_dels: bool,
    #[builder(default)]
    right_align_ambig_ins: bool,
    #[builder(default)]
    variant_mode: bool,
    #[builder(default)]
    separate_ambig_counts: bool,
    #[builder(default)]
    input_is_sorted: bool,
    #[builder(default)]
    input_is_unpaired: bool,
    #[builder(default)]
    warn_on_no_mapped: bool,
    #[builder(default)]
    trim_primers: bool,
    #[builder(default)]
    require_forward_primer_mapped: bool,
    #[builder(default)]
    require_reverse_primer_mapped: bool,
    #[builder(default = "10")]
    max_primer_offset: i32,
    #[builder(default)]
    use_only_mutation_type: Option<MutationTypeFilter>,
    #[builder(default)]
    target_length: Option<i64>,
}

#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct Pipeline {
    settings: Settings,
    #[builder(default)]
    primers: Vec<PrimerPair>,
    mutation_counter: MutationCounter,
    #[builder(default)]
    variant_counter: Option<VariantCounter>,
    #[builder(default)]
    parsed_out: Option<Box<dyn Write>>,
    #[builder(default)]
    debug_out: Option<Box<dyn Write>>,
    #[builder(setter(skip), default)]
    pending: Option<SamRecord>,
    #[builder(setter(skip), default)]
    included: u64,
    #[builder(setter(skip), default)]
    records: u64,
}

impl Pipeline {
    /// Stream one input through the pipeline. Mates of a proper pair are
    /// expected on adjacent lines; a record whose mate never shows up is
    /// processed as unpaired. Hard parse errors abort the stream.
    pub fn process<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() || line.starts_with('@') {
                continue;
            }
            let record = SamRecord::parse(&line)?;
            self.records += 1;
            self.feed(record)?;
        }
        self.flush_pending()?;
        Ok(())
    }

    /// Emit all remaining window cells (padded to the target length when
    /// configured) and enforce the mapped-read contract.
    pub fn finish(mut self) -> Result<()> {
        self.flush_pending()?;
        let target_length = self.settings.target_length();
        self.mutation_counter.finish(target_length)?;
        if let Some(counter) = self.variant_counter.as_mut() {
            counter.finish(target_length)?;
        }
        if let Some(out) = self.parsed_out.as_mut() {
            out.flush()?;
        }
        if let Some(out) = self.debug_out.as_mut() {
            out.flush()?;
        }
        if self.included == 0 {
            if self.settings.warn_on_no_mapped() {
                warn!("no reads mapped to the target");
            } else {
                return Err(Error::NoMappedReads.into());
            }
        } else {
            info!("{} records processed, {} included", self.records, self.included);
        }
        Ok(())
    }

    /// Stream already-processed reads (the serialized interchange format)
    /// straight into the counters, skipping locating and processing.
    pub fn process_parsed<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let read = Read::from_parsed_line(&line)?;
            self.records += 1;
            if read.mapping_category == MappingCategory::Included {
                self.included += 1;
            }
            self.mutation_counter.ingest(&read)?;
            if let Some(counter) = self.variant_counter.as_mut() {
                counter.ingest(&read)?;
            }
        }
        Ok(())
    }

    fn feed(&mut self, record: SamRecord) -> Result<()> {
        let pairable = !self.settings.input_is_unpaired()
            && record.is_paired()
            && record.is_proper_pair()
            && !record.is_unmapped()
            && !record.is_mate_unmapped();
        if pairable {
            if let Some(prev) = self.pending.take() {
                if prev.id == record.id {
                    return self.handle_pair(prev, record);
                }
                self.handle_single(prev)?;
            }
            self.pending = Some(record);
            return Ok(());
        }
        self.flush_pending()?;
        self.handle_single(record)
    }

    fn flush_pending(&mut self) -> Result<()> {
        if let Some(prev) = self.pending.take() {
            self.handle_single(prev)?;
        }
        Ok(())
    }

    fn handle_single(&mut self, record: SamRecord) -> Result<()> {
        let mut read = locate::locate_read(&record, self.settings.min_mapq())?;
        read.read_type = unpaired_type(&record);
        self.finalize(read)
    }

    fn handle_pair(&mut self, first: SamRecord, second: SamRecord) -> Result<()> {
        let min_mapq = self.settings.min_mapq();
        let mut r1 = locate::locate_read(&first, min_mapq)?;
        let mut r2 = locate::locate_read(&second, min_mapq)?;
        let r1_included = r1.mapping_category == MappingCategory::Included;
        let r2_included = r2.mapping_category == MappingCategory::Included;

        if r1_included && r2_included {
            r1.read_type = paired_type(&first);
            r2.read_type = paired_type(&second);
            let merged = if first.is_second_in_pair() {
                processing::merge::merge_mates(&r2, &r1)
            } else {
                processing::merge::merge_mates(&r1, &r2)
            };
            return self.finalize(merged);
        }

        // non-concordant pair: re-run both mates as unpaired reads; the
        // failing mate keeps its mapped span for depth accounting
        r1.read_type = unpaired_type(&first);
        r2.read_type = unpaired_type(&second);
        self.finalize(r1)?;
        self.finalize(r2)
    }

    fn finalize(&mut self, mut read: Read) -> Result<()> {
        if read.mapping_category == MappingCategory::Included && !self.primers.is_empty() {
            let matched =
                primers::match_read(&read, &self.primers, self.settings.max_primer_offset());
            let forward_ok = !self.settings.require_forward_primer_mapped()
                || matched.map_or(false, |m| m.forward_mapped);
            let reverse_ok = !self.settings.require_reverse_primer_mapped()
                || matched.map_or(false, |m| m.reverse_mapped);
            match matched {
                Some(m) if forward_ok && reverse_ok => read.primer_pair = m.pair as i32,
                _ if forward_ok && reverse_ok => {}
                _ => {
                    read.mapping_category = MappingCategory::OffTarget;
                    read.mutations.clear();
                    read.depth = BitVec::new_fill(false, read.len() as u64);
                    read.count = BitVec::new_fill(false, read.len() as u64);
                }
            }
        }

        if read.mapping_category == MappingCategory::Included {
            let settings = self.settings;
            let debug_out = self
                .debug_out
                .as_mut()
                .map(|out| &mut **out as &mut dyn Write);
            processing::process_read(&mut read, &settings, &self.primers, debug_out);
            self.included += 1;
        }

        if let Some(out) = self.parsed_out.as_mut() {
            writeln!(out, "{}", read.to_parsed_line())?;
        }
        self.mutation_counter.ingest(&read)?;
        if let Some(counter) = self.variant_counter.as_mut() {
            counter.ingest(&read)?;
        }
        Ok(())
    }
}

fn unpaired_type(record: &SamRecord) -> ReadType {
    if record.is_paired() {
        if record.is_second_in_pair() {
            ReadType::UnpairedR2
        } else {
            ReadType::UnpairedR1
        }
    } else {
        ReadType::Unpaired
    }
}

fn paired_type(record: &SamRecord) -> ReadType {
    if record.is_second_in_pair() {
        ReadType::PairedR2
    } else {
        ReadType::PairedR1
    }
}
