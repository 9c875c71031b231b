//! Authorization and credential policy.
//!
//! Two independent mechanisms coexist: group/permission grants checked with
//! `Principal::require_permission`, and profile roles checked with the role
//! predicates. Neither consults the other.

pub mod group;
pub mod password;
pub mod permission;
pub mod policy;
