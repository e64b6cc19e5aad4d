//! Authorization code exchange and the resulting credentials.

mod credentials;
mod exchanger;

pub use credentials::CredentialBundle;
pub use exchanger::{HttpTokenExchanger, TokenExchanger};
