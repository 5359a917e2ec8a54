pub mod jsonl;
pub mod mock;
pub mod search;
pub mod traits;

pub use jsonl::JsonlSource;
pub use mock::{generate_mock_records, MockSource};
pub use search::SearchIndexSource;
pub use traits::{RecordQuery, RecordSource, StaticSource};
