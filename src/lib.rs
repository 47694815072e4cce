pub mod fingerprint;
pub mod source;
pub mod probe;
pub mod manifest;
pub mod scan;
pub mod parallel;
pub mod generate;
pub mod verify;
pub mod report;
pub mod config;
pub mod logging;

pub use fingerprint::Fingerprint;
pub use source::{build_source, FingerprintSource, SourceKind};
pub use probe::{DecodeProbe, FlacTestProbe};
pub use manifest::{Manifest, ManifestError};
pub use generate::{GenerateOptions, Generator};
pub use verify::{Outcome, Verifier};
pub use report::BatchReport;
pub use config::Config;
