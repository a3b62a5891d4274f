/// Middleware for the API server
///
/// - `security`: hardening response headers
///
/// Bearer authentication lives in `app::auth_layer` because it needs the
/// application state.

pub mod security;
