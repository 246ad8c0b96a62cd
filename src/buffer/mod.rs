pub mod queue;

pub use queue::{AsyncQueue, QueueMetrics};
