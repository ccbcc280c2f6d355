mod admin_auth;
mod secure_headers;

pub use admin_auth::*;
pub use secure_headers::*;
