/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Banner and health check
/// - `users`: Registration, login and profiles
/// - `tasks`: Task postings and the applicant workflow

pub mod health;
pub mod tasks;
pub mod users;
