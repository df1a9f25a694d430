pub mod content;
pub mod metadata;
pub mod queue;
pub mod transcoder;
pub mod uploads;
