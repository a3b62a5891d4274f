/// Business operations
///
/// - `accounts`: registration, sign-in, token verification
/// - `marketplace`: tasks, applications and applicant review
///
/// Services are cheap to clone and hold the store as `Arc<dyn Store>`.

pub mod accounts;
pub mod marketplace;
