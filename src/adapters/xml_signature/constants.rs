//! XML signature algorithm and namespace URIs

pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Transforms
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const INCLUSIVE_C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const INCLUSIVE_C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const INCLUSIVE_C14N_11: &str = "http://www.w3.org/2006/12/xml-c14n11";
pub const INCLUSIVE_C14N_11_WITH_COMMENTS: &str =
    "http://www.w3.org/2006/12/xml-c14n11#WithComments";
pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXCLUSIVE_C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

/// Digest methods
pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

/// Signature methods
pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
pub const RSA_PSS_SHA256: &str = "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1";
pub const RSA_PSS_SHA384: &str = "http://www.w3.org/2007/05/xmldsig-more#sha384-rsa-MGF1";
pub const RSA_PSS_SHA512: &str = "http://www.w3.org/2007/05/xmldsig-more#sha512-rsa-MGF1";
pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";

/// Element names
pub const SIGNATURE_ELEMENT: &str = "Signature";
pub const SIGNED_INFO_ELEMENT: &str = "SignedInfo";
pub const SIGNATURE_VALUE_ELEMENT: &str = "SignatureValue";
pub const X509_CERTIFICATE_ELEMENT: &str = "X509Certificate";
pub const DIGEST_VALUE_ELEMENT: &str = "DigestValue";
pub const SIGNATURE_METHOD_ELEMENT: &str = "SignatureMethod";
pub const CANONICALIZATION_METHOD_ELEMENT: &str = "CanonicalizationMethod";
pub const DIGEST_METHOD_ELEMENT: &str = "DigestMethod";
pub const REFERENCE_ELEMENT: &str = "Reference";
pub const TRANSFORM_ELEMENT: &str = "Transform";
pub const INCLUSIVE_NAMESPACES_ELEMENT: &str = "InclusiveNamespaces";
pub const KEY_INFO_ELEMENT: &str = "KeyInfo";

/// Attribute names
pub const ALGORITHM_ATTRIBUTE: &str = "Algorithm";
pub const URI_ATTRIBUTE: &str = "URI";
pub const PREFIX_LIST_ATTRIBUTE: &str = "PrefixList";
