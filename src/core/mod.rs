pub mod canonical;
pub mod error;
pub mod retry;

pub use canonical::{canonical_json_bytes, canonical_json_string, sha256_hex};
pub use error::{PlanError, Result};
pub use retry::RetryPolicy;
