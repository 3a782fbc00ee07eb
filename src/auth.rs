//! Session state, token secrets, grant payloads, and the typed token response.

pub mod form;
pub mod grant;
pub mod secret;
pub mod session;

pub use form::*;
pub use grant::*;
pub use secret::*;
pub use session::*;
