//! Job store implementations.

pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;
