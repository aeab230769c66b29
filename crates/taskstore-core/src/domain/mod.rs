//! Domain model (tasks, mutation events, conditions, ids, wire contract).
//!
//! ここにある型は I/O を持ちません。ストレージやネットワークは ports 経由で扱います。

pub mod condition;
pub mod contract;
pub mod events;
pub mod ids;
pub mod task;

pub use self::condition::{Condition, LogicalOperator, Operation, Operator, Value, evaluate};
pub use self::events::{Event, EventType};
pub use self::ids::{Prefix, Tsid};
pub use self::task::{Status, Task, TaskUpdate};
