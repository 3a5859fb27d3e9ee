//! NestJS feature passes.

pub mod auth;
pub mod data;
pub mod storage;
pub mod web;

pub use self::auth::TypeScriptAuthPass;
pub use self::data::TypeScriptDataPass;
pub use self::storage::TypeScriptStoragePass;
pub use self::tests::TypeScriptTestsPass;
pub use self::web::NestWebPass;
