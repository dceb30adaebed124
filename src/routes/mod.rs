/// Router Module Index
///
/// Routing is split by access tier. Each group gets its gate as a layer in
/// `create_router`, so a handler cannot end up in the wrong tier by accident.

/// Routes open to everyone (anonymous readers included).
/// Draft visibility is enforced by the content store, not by routing.
pub mod public;

/// Routes behind the mandatory session gate (`AuthUser`).
pub mod authenticated;

/// Routes behind the elevated-role gate (`AdminUser`), nested under `/admin`.
pub mod admin;
