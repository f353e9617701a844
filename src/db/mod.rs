mod listeners;
mod repository;
mod schema;
mod store;
mod table;

pub use listeners::{RefreshListener, RefreshListeners};
pub use repository::{Clock, Collection, Repository};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
