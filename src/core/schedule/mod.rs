//! Scheduled report extractions
//!
//! - [`entry`] - Schedule entries and their persistence
//! - [`recurrence`] - Day, week and month recurrence rules
//! - [`planner`] - Which reports are due today, per owner timezone
//! - [`dispatch`] - Handing a plan to the report-execution trigger

pub mod dispatch;
pub mod entry;
pub mod planner;
pub mod recurrence;

pub use dispatch::{
    DispatchFailure, DispatchSummary, ExtractionRequestSink, RecordingSink, ScheduleDispatcher,
};
pub use entry::{list_entries, save_entry, RecurrenceUnit, ScheduleEntry};
pub use planner::{ConfigTimezoneResolver, DuePlan, ExtractionPlanner, TimezoneResolver};
pub use recurrence::is_due;
