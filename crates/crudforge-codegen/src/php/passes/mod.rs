//! Laravel feature passes.

pub mod auth;
pub mod data;
pub mod storage;
pub mod tests;
pub mod web;

pub use self::auth::PhpAuthPass;
pub use self::data::PhpDataPass;
pub use self::storage::PhpStoragePass;
pub use self::tests::PhpTestsPass;
pub use self::web::LaravelWebPass;
