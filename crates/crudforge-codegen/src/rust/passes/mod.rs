//! Rust feature passes.
//!
//! Each pass layers one concern onto the models emitted by
//! [`RustBasePass`](super::RustBasePass).

pub mod auth;
pub mod axum;
pub mod data;
pub mod storage;
pub mod tests;

pub use self::auth::RustAuthPass;
pub use self::axum::AxumPass;
pub use self::data::RustDataPass;
pub use self::storage::RustStoragePass;
pub use self::tests::RustTestsPass;
