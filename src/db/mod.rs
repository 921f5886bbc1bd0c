pub mod mongo;
pub mod schemas;
pub mod store;

pub use mongo::MongoClient;
pub use store::{AuthStore, MemoryAuthStore, MongoAuthStore};
