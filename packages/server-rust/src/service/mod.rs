//! Query service layer.
//!
//! 1. **Config** (`config`): database, sampling, translator and matcher tuning
//! 2. **Pipeline** (`query`): schema cache -> translate -> enhance -> execute
//! 3. **Narration** (`narrate`): English summary of an executed query

pub mod config;
pub mod narrate;
pub mod query;

pub use config::ServerConfig;
pub use narrate::{describe_filter, narrate};
pub use query::{QueryOutcome, QueryService};
