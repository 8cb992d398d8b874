use crate::certificate::CertificateOptions;
use crate::verify::MultiSignaturePolicy;

/// Deployment-level settings. Passed explicitly into the service layer,
/// never read from globals.
#[derive(Debug, Clone)]
pub struct Config {
    /// Subject attributes and validity window for issued certificates.
    pub certificate: CertificateOptions,
    /// How verdicts are combined when a document carries several signatures.
    pub multi_signature_policy: MultiSignaturePolicy,
    /// Whether generated private keys may be written to the user store
    /// unencrypted. Matches the source system when enabled; when disabled
    /// the key pair is still returned to the caller but only the public
    /// half is persisted.
    pub allow_plaintext_key_storage: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            certificate: CertificateOptions::default(),
            multi_signature_policy: MultiSignaturePolicy::default(),
            allow_plaintext_key_storage: true,
        }
    }
}
