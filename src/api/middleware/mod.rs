pub mod auth;
pub mod trace_id;

pub use auth::{require_auth, AuthUser};
pub use trace_id::{trace_id_middleware, TraceId};
