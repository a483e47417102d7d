//! Result descriptors, converted rows, and the containers results are returned in.

mod descriptor;
mod map;
mod reader;
mod result_set;
mod row;

pub use descriptor::{ResultDescriptor, ResultKind, ResultPlan, ResultShape};
pub use map::{ResultMap, ResultValue};
pub use reader::{ListRowReader, MapRowReader, RowReader, RowReaderRegistry};
pub use result_set::ResultSet;
pub use row::{ColumnIndex, Row};
