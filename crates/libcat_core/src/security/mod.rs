//! Response hardening policy shared by HTTP adapters.

pub mod headers;
