mod loader;
mod types;

pub use loader::{ConfigLoader, ENV_VARS};
pub use types::{DEFAULT_PORT, FramecastConfig};
// DEFAULT_HOST is used by tests in commands/serve.rs
#[allow(unused_imports)]
pub use types::DEFAULT_HOST;
