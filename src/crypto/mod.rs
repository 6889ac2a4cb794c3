pub mod password;
pub mod token;

pub use password::{generate_salt, hash_password, verify_password, HashParams};
pub use token::SessionIssuer;
