//! Bearer token authentication.
//!
//! Tokens are issued by an external identity provider and signed with a
//! secret shared with this gateway. Verification is stateless: every request
//! re-checks signature, expiry and audience; nothing is stored.

pub mod audit;
pub mod bearer;
pub mod verifier;

pub use audit::AuditEvent;
pub use bearer::{extract_bearer, parse_authorization, token_from_input};
pub use verifier::{AuthenticatedUser, TokenError, TokenVerifier, unix_now};
