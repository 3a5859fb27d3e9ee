//! FastAPI feature passes.

pub mod auth;
pub mod data;
pub mod storage;
pub mod web;

pub use self::auth::PythonAuthPass;
pub use self::data::PythonDataPass;
pub use self::storage::PythonStoragePass;
pub use self::tests::PythonTestsPass;
pub use self::web::FastApiWebPass;
