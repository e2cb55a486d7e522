pub mod c14n;
pub mod constants;
pub mod error;
pub mod utils;
pub mod verifier;

pub use error::{Result, XmlSignatureError};
pub use verifier::{EnvelopedSignatureVerifier, SignatureVerification, XmlSignatureVerifier};
