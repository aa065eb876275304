//! Concrete resource implementations

pub mod connection;
pub mod file;
pub mod lock;
pub mod timer;
pub mod transaction;

pub use connection::{Connection, ConnectionConfig};
pub use file::{FileConfig, FileMode, FileResource, Retention};
pub use lock::{LockConfig, LockResource, LockTable};
pub use timer::{Timer, TimerConfig};
pub use transaction::{Database, Transaction, TransactionConfig};
