//! Text encodings: bcrypt's base64 dialect and the `$2b$` hash string layout.

pub mod base64;
pub mod hash;
