pub mod mark;
pub mod member;
pub mod prayer;
pub mod stats;

pub use mark::{Mark, MarkStatus};
pub use member::{Group, Location, User};
pub use prayer::{DailyTimings, PrayerType};
pub use stats::{Period, ProgressEntry};
