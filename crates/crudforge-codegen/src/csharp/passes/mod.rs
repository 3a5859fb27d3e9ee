//! ASP.NET Core feature passes.

pub mod auth;
pub mod data;
pub mod storage;
pub mod tests;
pub mod web;

pub use self::auth::CSharpAuthPass;
pub use self::data::CSharpDataPass;
pub use self::storage::CSharpStoragePass;
pub use self::tests::CSharpTestsPass;
pub use self::web::AspNetWebPass;
