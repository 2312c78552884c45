pub mod input;

// Re-export commonly used types/functions for consumers
pub use input::{load_catalog, open_input, read_records, RecordRow};
