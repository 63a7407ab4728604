//! Core identity types shared by the federation crates.
//!
//! [`UserData`] is the accumulator filled by provider mappers during a login
//! callback, [`Claims`] is what gets signed into handshake and session tokens, and
//! [`ClaimsService`] is the seam to whatever signs, stores and reads those tokens.

mod claims;
mod user;

pub use claims::{Claims, ClaimsError, ClaimsResult, ClaimsService, Handshake};
pub use user::{Collection, EMAILS_COLLECTION, User, UserData, hash_id};
