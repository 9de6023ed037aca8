mod lock;
mod scheduler;

pub use lock::InstanceLock;
pub use scheduler::Scheduler;
