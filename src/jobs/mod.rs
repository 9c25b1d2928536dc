pub mod scheduler;

pub use scheduler::DispatchScheduler;
