//! Mutation load analysis from aligned sequencing reads.
//!
//! The core is three pure stages: a variant table [`loader`], a pileup
//! aggregator ([`pileup`]) that turns per-position read observations into
//! variant records, and a sliding-window scorer ([`scoring`]). File-format
//! adaptors ([`bam_reader`], [`reference`], [`output`]) sit at the edges and
//! are the only places that touch disk.

pub mod bam_reader;
pub mod error;
pub mod loader;
pub mod output;
pub mod pileup;
pub mod reference;
pub mod scoring;
pub mod types;

pub use error::{MutloadError, Result};
pub use loader::load_variant_table;
pub use pileup::{aggregate, call_column, ReferenceLookup};
pub use scoring::score_windows;
pub use types::{
    BaseObservation, CallerConfig, LoadSeries, PileupColumn, VariantRecord, VariantTable,
    WindowConfig, WindowScore,
};
