//! Listener setup, the serve loops and the route table.

mod core;
mod router;

pub use self::core::BenchServer;
pub use self::router::{router, CountQuery, CONTENT_TYPE_TEXT, SERVER_NAME};
