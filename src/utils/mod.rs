mod password;
mod token;

pub use password::{generate_opaque_token, generate_reset_token, hash_password, verify_password};
pub use token::{Claims, decode_access_token, issue_access_token, validate_access_token};
