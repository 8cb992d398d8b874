mod acro_form;
mod byte_range;
mod certificate;
mod config;
mod digitally_sign;
mod error;
mod keys;
mod service;
mod signature_info;
mod signer;
mod store;
mod verify;

pub use lopdf;

pub use byte_range::ByteRange;
pub use certificate::{issue_certificate, CertificateOptions};
pub use config::Config;
pub use digitally_sign::{sign_pdf, PdfSigningDocument};
pub use error::Error;
pub use keys::{generate_key_pair, KeyPair};
pub use service::{
    CertificateArtifacts, KeyPairArtifacts, PrivateKeySource, ProvisionedIdentity, SignedDocument,
    SigningService,
};
pub use signature_info::SignatureDescriptor;
pub use signer::SignerIdentity;
pub use store::{InMemoryUserStore, UserRecord, UserStore};
pub use verify::{
    verify_document, MultiSignaturePolicy, SignatureMetadata, SignatureReport, TrustedSigner,
    VerificationOutcome,
};
