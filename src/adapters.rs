pub mod retriever;
pub mod xml_signature;

pub use retriever::{HttpResourceRetriever, ResourceRetriever, RetrieverError};
pub use xml_signature::{EnvelopedSignatureVerifier, SignatureVerification, XmlSignatureVerifier};
