pub mod signal_log;
pub mod verification;

pub use signal_log::SignalLog;
pub use verification::{AccuracyStats, PendingVerification, Resolution, VerificationTracker};
