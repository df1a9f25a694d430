pub mod fs;
pub mod memory_queue;

pub use fs::{FsContent, FsUploads};
pub use memory_queue::MemoryQueue;
