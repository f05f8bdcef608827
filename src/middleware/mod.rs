pub mod authz;
pub mod headers;
pub mod metrics;

pub use authz::{AuthDecision, Authorizer, DenyReason, Privilege};
