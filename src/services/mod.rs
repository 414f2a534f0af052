//! Business logic for the gateway.
//!
//! - [`upstream`]: one attempt (unary or streaming) against one endpoint
//! - [`failover`]: ordered iteration over the endpoint list
//! - [`sessions`]: live streaming session registry and chunk relay

pub mod failover;
pub mod sessions;
pub mod upstream;

pub use failover::FailoverService;
pub use sessions::SessionRegistry;
pub use upstream::{AttemptOutcome, UpstreamClient};
