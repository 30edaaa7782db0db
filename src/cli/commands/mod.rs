//! CLI command implementations.

pub mod config;
pub mod game;
pub mod resolve;
pub mod session;

pub use config::ConfigArgs;
pub use game::GameArgs;
pub use resolve::ResolveArgs;
pub use session::SessionArgs;
