pub mod app_config;
pub mod database;
pub mod memory;
pub mod pg_ledger;

pub use database::DbClient;
pub use memory::MemoryLedgerStore;
pub use pg_ledger::PgLedgerStore;
