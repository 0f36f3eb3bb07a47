//! Local health data source and paginated extraction

mod extractor;
mod file;
mod memory;
mod traits;

pub use extractor::SourceExtractor;
pub use file::FileHealthSource;
pub use memory::InMemoryHealthSource;
pub use traits::{HealthSource, RawSample, RawWorkout};
