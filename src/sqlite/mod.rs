// SQLite driver - runs compiled statements through rusqlite
//
// - config: connection options and opening
// - params: value conversion between driver values and rusqlite values
// - connection: the `Driver` implementation, its statements and cursors

pub mod config;
pub mod connection;
pub mod params;

pub use config::SqliteOptions;
pub use connection::{SqliteCursor, SqliteDriver, SqliteStatement};
