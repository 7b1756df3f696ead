mod session;

pub use session::{AuthError, AuthSession, Credentials, Identity};
