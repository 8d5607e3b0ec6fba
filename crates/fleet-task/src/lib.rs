//! `fleet-task` — delivery tasks and their allocation to robots.
//!
//! | Module        | Contents                                         |
//! |---------------|--------------------------------------------------|
//! | [`task`]      | `Task`, `TaskStatus`                             |
//! | [`allocator`] | `TaskAllocator`: pending pool and assignment     |
//! | [`error`]     | `TaskError`, `TaskResult<T>`                     |
//!
//! Pending tasks are kept in submission order.  A task handed back (robot
//! removed, planning failed) keeps its original sequence number and so its
//! place in line.

pub mod allocator;
pub mod error;
pub mod task;


pub use allocator::TaskAllocator;
pub use error::{TaskError, TaskResult};
pub use task::{Task, TaskStatus};
