//! Certificate authority and leaf issuance.
//!
//! This module builds a self-signed root and issues leaf server certificates
//! signed by it.

pub mod builder;
pub mod ca;
pub mod inspect;
pub mod san;
pub mod verify;
