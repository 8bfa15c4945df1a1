mod local_store;
mod schema;
mod types;

pub use local_store::{LocalStore, MemoryStore};
pub use schema::Database;
pub use types::DatabaseError;
