//! Performances: the sing/say entry points, content selection and the
//! scheduled body/tail cycle around them.

pub mod cycle;
pub mod performer;
pub mod picker;

pub use cycle::{ContentSource, CycleReport, CycleStage, PerformanceCycle};
pub use performer::Performer;
pub use picker::ContentPicker;
