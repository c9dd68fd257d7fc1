//! Route handlers organized by screen.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod home;
