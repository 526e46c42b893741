//! censuskv-storage: key-value store backends.
//!
//! | Backend | Feature | Use case |
//! |---------|---------|----------|
//! | [`memory::InMemoryStore`] | `memory` (default) | Tests, dry runs, fault simulation |
//! | [`sqlite::SqliteStore`] | `sqlite` | Persistent local store |

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

mod validate;

#[cfg(feature = "memory")]
pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
