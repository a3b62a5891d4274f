/// Database models for the marketplace
///
/// Each model carries its row type, its creation input and the SQL that
/// reads and writes it. Services reach these through the store traits in
/// [`crate::store`] rather than calling them directly.
///
/// # Models
///
/// - `user`: accounts, roles and public projections
/// - `task`: work postings
/// - `applicant`: applications embedded in tasks, with review status

pub mod applicant;
pub mod task;
pub mod user;
