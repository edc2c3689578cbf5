//! Router Module Index
//!
//! Routes are grouped by who may call them. The access guard in `crate::access`
//! enforces the role-scoped groups by path prefix; the authenticated group only
//! requires a resolvable identity and role.

/// Routes open to anonymous callers: health, session, discovery.
pub mod public;

/// Routes for any signed-in user regardless of role.
pub mod authenticated;

/// Routes nested under `/customer`.
pub mod customer;

/// Routes nested under `/professional`.
pub mod professional;
