//! WildFi telemetry: burst decoding, quality checks, import, proximity
//! graph and location classification.

pub mod burst;
pub mod checker;
pub mod classifier;
pub mod dba;
pub mod importer;
pub mod merge;
pub mod models;
pub mod proximity;
pub mod raw;
pub mod report;

pub use classifier::{Classification, LocationOrder};
pub use models::{
    BadRow, Datasets, GpsFix, Observation, ObservationKind, ProximityEdge, QualityFlag,
    RawObservation, RowKind, SensorRecord, TagMetadata,
};
