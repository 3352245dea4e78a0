/// A single variant site with its alternate-allele frequency
///
/// Records loaded from an external table carry only the three core fields;
/// records produced by the pileup caller also carry read-count provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    pub pos: u64, // 1-based
    pub alt_allele_freq: f64,

    // Provenance, present only for caller-produced records
    pub reads_passing_mapq: Option<u32>,
    pub alt_reads: Option<u32>,
    pub multiallelic: Option<bool>,
}

/// An ordered collection of variant records
pub type VariantTable = Vec<VariantRecord>;

/// One aligned base (or gap) observed at a pileup position
#[derive(Debug, Clone, Copy)]
pub struct BaseObservation {
    pub base: char, // '*' for deletions and reference skips
    pub mapq: u8,
    pub is_del_or_refskip: bool,
}

impl BaseObservation {
    /// An observation of a called base.
    pub fn new(base: char, mapq: u8) -> Self {
        BaseObservation {
            base,
            mapq,
            is_del_or_refskip: false,
        }
    }

    /// A deletion or reference-skip placeholder.
    pub fn gap(mapq: u8) -> Self {
        BaseObservation {
            base: '*',
            mapq,
            is_del_or_refskip: true,
        }
    }
}

/// All read observations covering one reference position
#[derive(Debug, Clone)]
pub struct PileupColumn {
    pub chrom: String,
    pub pos: u64, // 1-based
    pub observations: Vec<BaseObservation>,
}

/// Thresholds applied when calling variants from pileup columns
#[derive(Debug, Clone, Copy)]
pub struct CallerConfig {
    pub min_coverage: u32,  // reads passing MAPQ required to evaluate a site
    pub min_alt_reads: u32, // non-reference reads required to emit a record
    pub mapq_threshold: u8, // reads strictly below this are discarded
}

impl Default for CallerConfig {
    fn default() -> Self {
        CallerConfig {
            min_coverage: 20,
            min_alt_reads: 5,
            mapq_threshold: 50,
        }
    }
}

/// Parameters of the sliding-window load scorer
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub bin_size: u64,     // window width in bases, inclusive of both ends
    pub max_alt_freq: f64, // records above this frequency never contribute
    pub min_events: usize, // windows with fewer qualifying records score 0.0
}

impl WindowConfig {
    /// Scores every window that contains at least one qualifying record.
    pub fn permissive() -> Self {
        WindowConfig {
            bin_size: 30,
            max_alt_freq: 0.35,
            min_events: 0,
        }
    }

    /// Suppresses sparse windows the way the strict legacy pipeline did.
    pub fn filtered() -> Self {
        WindowConfig {
            min_events: 4,
            ..WindowConfig::permissive()
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig::permissive()
    }
}

/// Load score for one window, keyed by the window's start position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowScore {
    pub start: u64, // 1-based, window covers [start, start + bin_size - 1]
    pub score: f64,
}

/// Scores for every window start in an interval, in ascending order
pub type LoadSeries = Vec<WindowScore>;
