//! The bcrypt engine. `blowfish` and `eksblowfish` hold the cipher and the
//! expensive key schedule, `salt` and `prehash` prepare inputs, and
//! `passwords` ties them into the public hashing API.

pub mod blowfish;
mod constants;
pub mod eksblowfish;
pub mod passwords;
pub mod prehash;
pub mod salt;
