// Database module
// Vector store (LanceDB) and analytical store (SQLite) sessions behind a shared registry

pub mod analytical;
pub mod guard;
pub mod models;
pub mod normalize;
pub mod registry;
pub mod scratch;
pub mod vector;

pub use analytical::AnalyticalStoreSession;
pub use registry::{BackendRegistry, BackendSession};
pub use vector::VectorStoreSession;
