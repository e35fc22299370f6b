//! Per-read processing: the fixed operation chain between the mutation
//! locator and the scanning counter.

pub mod classify;
pub mod collapse;
pub mod merge;
pub mod quality;
pub mod shift;
pub mod trim;

use std::io::Write;

use itertools::Itertools;

use crate::model::Read;
use crate::pipeline::Settings;
use crate::primers::PrimerPair;

/// Run the processing chain on one located read (or merged pair): trimming,
/// optional ambiguity shift, adjacent-mutation merge, classification and the
/// quality filter. The debug sink, when present, receives a line per step.
pub fn process_read(
    read: &mut Read,
    settings: &Settings,
    primers: &[PrimerPair],
    mut debug_out: Option<&mut dyn Write>,
) {
    let mut trace = |step: &str, read: &Read| {
        if let Some(out) = debug_out.as_mut() {
            let _ = writeln!(
                out,
                "{}\t{}\t[{}, {}]\t{}",
                read.id,
                step,
                read.left,
                read.right,
                read.mutations.iter().map(|m| m.to_string()).join(" ")
            );
        }
    };

    if settings.trim_primers() && !primers.is_empty() {
        trim::trim_primers(read, primers);
        trace("trim_primers", read);
    } else if settings.exclude_3prime() > 0 {
        trim::trim_right_end(read, settings.exclude_3prime());
        trace("trim_3prime", read);
    }

    shift::shift_ambiguous(read, settings);
    trace("shift", read);

    collapse::collapse_adjacent(read, settings);
    trace("collapse", read);

    classify::classify_mutations(read);
    trace("classify", read);

    quality::apply_quality_filter(read, settings);
    trace("quality", read);
}
