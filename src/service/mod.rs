// Services that drive the scanner and the ledgers together

pub mod change_detector;
pub mod event_cleaner;

pub use change_detector::{
    ChangeDetector, DetectionOutcome, event_type_for_change, latest_events_by_path,
};
pub use event_cleaner::{CleanupReport, EventCleaner};
