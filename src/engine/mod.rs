pub mod aggregator;
pub mod criteria;
pub mod detector;
pub mod filter;
pub mod scheduler;

pub use criteria::Criteria;
pub use scheduler::{PollScheduler, SchedulerHandle};
