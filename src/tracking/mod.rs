pub mod progress;
pub mod service;
pub mod window;

pub use service::Tracker;
