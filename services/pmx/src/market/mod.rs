//! Raw records → canonical records → aggregates → YoY → shaped output
//!
//! The stages in this module are pure: they do no I/O and keep no state
//! between calls.
//! 1. `normalize` validates raw records, dropping invalid ones with a reason
//! 2. `period` resolves the calendar windows for a given day
//! 3. `aggregate` groups records by (geo-unit, bedrooms) with optional trimming
//! 4. `yoy` compares current and prior aggregates
//! 5. `shape` nests results by geo-unit for the response layer
//! 6. `outputs` persists shaped and aggregated results

pub mod record;
pub mod normalize;
pub mod period;
pub mod aggregate;
pub mod yoy;
pub mod shape;
pub mod outputs;

pub use record::*;
pub use normalize::*;
pub use period::*;
pub use aggregate::*;
pub use yoy::*;
pub use shape::*;
