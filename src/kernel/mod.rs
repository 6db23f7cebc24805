// Slice fetch scheduling: partition, worker threads, shared cache.
//
// Workers are real OS threads, one per partition; within a partition
// slots are strictly increasing, across partitions there is no order.

pub mod cache;
pub mod scheduler;
pub mod tasks;

pub use cache::{Progress, SliceCache, SlotState};
pub use scheduler::{SliceHandle, display_order, partition};
pub use tasks::{PrefetchReport, Prefetcher, SliceEvent, SliceSource, spawn_workers};
