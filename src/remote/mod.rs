//! Remote system of record.
//!
//! - [`gateway`] - REST gateway for inserts, updates and upserts
//! - [`session`] - owner resolution (fixed owner or bearer-token lookup)

pub mod gateway;
pub mod session;

pub use gateway::HttpGateway;
pub use session::{SessionSource, TokenLookup};
