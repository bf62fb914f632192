//! Secondary store replication
//!
//! - Mutation values describing committed primary writes
//! - Lazily-connected secondary store applying them as upserts
//! - Dispatcher running replica writes in the background

mod dispatcher;
mod mutation;
mod store;

pub use dispatcher::{Dispatch, DualWriteDispatcher};
pub use mutation::Mutation;
pub use store::{SECONDARY_SCHEMA, SECONDARY_TABLES, SecondaryStore};
