// Cachet - A pluggable cache layer for Rust
//
// One async interface over in-process, shared-memory, memcache, Redis and
// database backends, with atomic read-modify-write where the backend has it.

// Re-export the cache layer
pub use cachet_cache::*;

// Re-export logging
pub use cachet_log as log;

/// Prelude module for convenient imports
pub mod prelude {
    pub use cachet_cache::prelude::*;
    pub use cachet_cache::{Namespace, get_object, remember, remember_forever, set_object};
}
