//! Go feature passes.

pub mod auth;
pub mod chi;
pub mod data;
pub mod gin;
pub mod storage;
pub mod tests;
mod web;

pub use self::auth::GoAuthPass;
pub use self::chi::ChiPass;
pub use self::data::GoDataPass;
pub use self::gin::GinPass;
pub use self::storage::GoStoragePass;
pub use self::tests::GoTestsPass;
