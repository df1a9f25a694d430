pub mod admission;
pub mod worker;

pub use admission::AdmissionService;
pub use worker::WorkerService;
