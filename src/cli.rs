// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use structopt::StructOpt;
use strum::VariantNames;

use crate::counting::{MutationCounter, VariantCounter};
use crate::model::MutationTypeFilter;
use crate::pipeline::{PipelineBuilder, Settings, SettingsBuilder};
use crate::primers;

#[derive(Debug, StructOpt, Serialize, Deserialize, Clone)]
#[structopt(
    name = "mutscan",
    about = "Count mutations and effective read depths per reference position from aligned chemical-probing reads.",
    setting = structopt::clap::AppSettings::ColoredHelp,
)]
pub struct Mutscan {
    #[structopt(
        long = "in",
        parse(from_os_str),
        required_unless = "parsed_in",
        help = "Aligned read files (SAM). Multiple files are streamed into one output."
    )]
    pub inputs: Vec<PathBuf>,
    #[structopt(
        long,
        parse(from_os_str),
        help = "Per-position mutation count table (if omitted, write to STDOUT)."
    )]
    pub out: Option<PathBuf>,
    #[structopt(
        long = "variant-out",
        parse(from_os_str),
        help = "Per-position sequence-variant table."
    )]
    pub variant_out: Option<PathBuf>,
    #[structopt(
        long = "parsed-out",
        parse(from_os_str),
        help = "Serialized processed reads (one line per read), the internal format between processor and counter."
    )]
    pub parsed_out: Option<PathBuf>,
    #[structopt(
        long = "parsed-in",
        parse(from_os_str),
        conflicts_with = "inputs",
        help = "Count from serialized processed reads (written by --parsed-out) instead of aligned records."
    )]
    pub parsed_in: Vec<PathBuf>,
    #[structopt(
        long = "debug-out",
        parse(from_os_str),
        help = "Human-readable trace of every processing step. Intended for debugging only."
    )]
    pub debug_out: Option<PathBuf>,
    #[structopt(
        long,
        help = "Reference length. Output tables are padded to this length irrespective of coverage."
    )]
    pub length: Option<i64>,
    #[structopt(
        long = "min-mapq",
        default_value = "30",
        help = "Minimum mapping quality. Records below the threshold keep their mapped span for depth accounting but produce no mutations."
    )]
    pub min_mapq: u8,
    #[structopt(
        long = "min-qual",
        default_value = "30",
        help = "Minimum basecall PHRED score. A position counts toward effective depth only if it and both neighbors pass; a mutation only if all its bases and flanks pass."
    )]
    pub min_qual: u8,
    #[structopt(
        long = "exclude-3prime",
        default_value = "0",
        help = "Exclude this many positions at the 3' end of each read from effective depth."
    )]
    pub exclude_3prime: u32,
    #[structopt(
        long = "max-internal-match",
        default_value = "7",
        help = "Mutations separated by at most this many unchanged reference bases are merged into one event."
    )]
    pub max_internal_match: u32,
    #[structopt(
        long = "right-align-ambig-dels",
        help = "Realign ambiguously placed deletions to their rightmost valid position instead of keeping the merged placement span."
    )]
    pub right_align_ambig_dels: bool,
    #[structopt(
        long = "right-align-ambig-ins",
        help = "Realign ambiguously placed insertions to their rightmost valid position."
    )]
    pub right_align_ambig_ins: bool,
    #[structopt(
        long = "variant-mode",
        help = "Keep mutation spans in effective depth and skip ambiguity shifting, so variant frequencies can be read directly from the variant table."
    )]
    pub variant_mode: bool,
    #[structopt(
        long = "separate-ambig-counts",
        help = "Add a <tag>_ambig column per mutation class counting mutations derived from ambiguously aligned indels."
    )]
    pub separate_ambig_counts: bool,
    #[structopt(
        long = "input-is-sorted",
        help = "Assert that input records are sorted by leftmost position; output is then emitted progressively and memory stays bounded."
    )]
    pub input_is_sorted: bool,
    #[structopt(
        long = "input-is-unpaired",
        help = "Treat every record as unpaired, skipping mate-pair merging."
    )]
    pub input_is_unpaired: bool,
    #[structopt(
        long = "warn-on-no-mapped",
        help = "Only warn (instead of failing) when the input contains no mapped reads."
    )]
    pub warn_on_no_mapped: bool,
    #[structopt(
        long,
        parse(from_os_str),
        help = "Primer pair locations (four 0-based integers per line: fw_left fw_right rv_left rv_right)."
    )]
    pub primers: Option<PathBuf>,
    #[structopt(
        long = "trim-primers",
        help = "Exclude primer footprints from effective depth and drop mutations inside them."
    )]
    pub trim_primers: bool,
    #[structopt(
        long = "require-forward-primer-mapped",
        help = "Demote reads whose 5' end does not match a forward primer location to off-target."
    )]
    pub require_forward_primer_mapped: bool,
    #[structopt(
        long = "require-reverse-primer-mapped",
        help = "Demote reads whose 3' end does not match a reverse primer location to off-target."
    )]
    pub require_reverse_primer_mapped: bool,
    #[structopt(
        long = "max-primer-offset",
        default_value = "10",
        help = "Maximum distance between a read end and its primer location."
    )]
    pub max_primer_offset: i32,
    #[structopt(
        long = "use-only-mutation-type",
        possible_values = MutationTypeFilter::VARIANTS,
        help = "Restrict counting to one mutation class; other mutations still blank the depth they covered."
    )]
    pub use_only_mutation_type: Option<MutationTypeFilter>,
}

impl Mutscan {
    fn settings(&self) -> Result<Settings> {
        SettingsBuilder::default()
            .min_mapq(self.min_mapq)
            .min_qual(self.min_qual)
            .exclude_3prime(self.exclude_3prime)
            .max_internal_match(self.max_internal_match)
            .right_align_ambig_dels(self.right_align_ambig_dels)
            .right_align_ambig_ins(self.right_align_ambig_ins)
            .variant_mode(self.variant_mode)
            .separate_ambig_counts(self.separate_ambig_counts)
            .input_is_sorted(self.input_is_sorted)
            .input_is_unpaired(self.input_is_unpaired)
            .warn_on_no_mapped(self.warn_on_no_mapped)
            .trim_primers(self.trim_primers)
            .require_forward_primer_mapped(self.require_forward_primer_mapped)
            .require_reverse_primer_mapped(self.require_reverse_primer_mapped)
            .max_primer_offset(self.max_primer_offset)
            .use_only_mutation_type(self.use_only_mutation_type)
            .target_length(self.length)
            .build()
            .map_err(|e| anyhow::anyhow!(e))
    }
}

fn open_output(path: Option<&PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(
            || format!("unable to create {}", path.display()),
        )?)),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

pub fn run(opt: Mutscan) -> Result<()> {
    let settings = opt.settings()?;

    let primer_pairs = match &opt.primers {
        Some(path) => primers::read_primer_file(path)?,
        None => Vec::new(),
    };

    let mut count_out = open_output(opt.out.as_ref())?;
    // effective options ahead of the header; runs are reproducible from
    // their output alone
    writeln!(count_out, "# mutscan_args={}", serde_json::to_string(&opt)?)?;
    let mutation_counter = MutationCounter::new(
        count_out,
        opt.separate_ambig_counts,
        if opt.trim_primers || !primer_pairs.is_empty() {
            primer_pairs.len()
        } else {
            0
        },
        opt.input_is_sorted,
    )?;

    let variant_counter = match &opt.variant_out {
        Some(path) => Some(VariantCounter::new(
            open_output(Some(path))?,
            opt.input_is_sorted,
        )),
        None => None,
    };

    let mut builder = PipelineBuilder::default()
        .settings(settings)
        .primers(primer_pairs)
        .mutation_counter(mutation_counter)
        .variant_counter(variant_counter);
    if let Some(path) = &opt.parsed_out {
        builder = builder.parsed_out(Some(open_output(Some(path))?));
    }
    if let Some(path) = &opt.debug_out {
        builder = builder.debug_out(Some(open_output(Some(path))?));
    }
    let mut pipeline = builder.build().map_err(|e| anyhow::anyhow!(e))?;

    for path in &opt.inputs {
        info!("processing {}", path.display());
        let file = File::open(path)
            .with_context(|| format!("unable to open {}", path.display()))?;
        pipeline.process(BufReader::new(file))?;
    }
    for path in &opt.parsed_in {
        info!("counting serialized reads from {}", path.display());
        let file = File::open(path)
            .with_context(|| format!("unable to open {}", path.display()))?;
        pipeline.process_parsed(BufReader::new(file))?;
    }
    pipeline.finish()
}
