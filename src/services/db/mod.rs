pub mod handle;
pub mod postgres;
pub mod tx;

pub use handle::{TxGuard, TxHandle};
pub use postgres::{PgDatabase, PgTx};
pub use tx::{Database, DbError, DbTx};
