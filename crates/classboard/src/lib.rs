//! Client-side schedule reconciliation for a role-aware academic
//! administration API.

pub mod schedule;
