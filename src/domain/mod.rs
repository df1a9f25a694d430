pub mod jobs;
pub mod mime;
pub mod video;
