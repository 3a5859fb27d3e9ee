//! Spring feature passes.

pub mod auth;
pub mod data;
pub mod storage;
pub mod tests;
pub mod web;

pub use self::auth::JavaAuthPass;
pub use self::data::JavaDataPass;
pub use self::storage::JavaStoragePass;
pub use self::tests::JavaTestsPass;
pub use self::web::SpringWebPass;
