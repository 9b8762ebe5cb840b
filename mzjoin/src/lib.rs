// src/lib.rs
pub mod error;
pub mod tolerance;

// data module
pub mod data {
    pub mod feature;
    pub mod isotope;
    pub mod row;
    pub mod table;
}

// scoring module
pub mod scoring {
    pub mod params;
    pub mod isotope;
    pub mod scorer;
}

// alignment module
pub mod candidates;
pub mod align;

// Re-export commonly used types
pub use align::{AlignmentOutcome, AlignmentReport, AlignmentState, AlignmentStatus, CancellationToken, JoinAligner, Progress};
pub use data::feature::{FeatureRecord, RunId};
pub use data::isotope::IsotopePattern;
pub use data::row::{AlignedRow, RowId};
pub use data::table::{FeatureTable, MasterTable};
pub use error::{AlignmentError, RecordError};
pub use scoring::params::{IsotopeComparisonParameters, JoinParameters};
pub use scoring::scorer::{MatchScore, Scorer};
pub use tolerance::{RelativeScale, ToleranceWindow};
