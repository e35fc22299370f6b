// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Core mutation-analysis engine of a chemical-probing sequencing pipeline:
//! locates mutations in aligned reads by walking CIGAR and MD jointly,
//! resolves ambiguous indels, merges mate pairs, filters by basecall
//! quality, and aggregates per-position mutation counts and effective read
//! depths through bounded sliding windows.

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate getset;

pub mod cli;
pub mod counting;
pub mod errors;
pub mod locate;
pub mod model;
pub mod pipeline;
pub mod primers;
pub mod processing;
pub mod sam;
