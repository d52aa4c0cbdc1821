pub mod heap;
pub mod object;
pub mod table;
pub mod value;

pub use heap::{Heap, HeapStats, ObjectId};
pub use object::*;
pub use table::{RobinHoodTable, Table, TableKey, ValueTable};
pub use value::{Value, ValueKind, values_equal};
