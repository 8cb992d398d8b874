use crate::byte_range::to_hex;
use crate::certificate::issue_certificate;
use crate::config::Config;
use crate::digitally_sign::sign_pdf;
use crate::error::Error;
use crate::keys::{generate_key_pair, KeyPair};
use crate::signer::SignerIdentity;
use crate::store::{UserRecord, UserStore};
use crate::verify::{verify_document, VerificationOutcome};
use sha2::{Digest, Sha256};

/// Where the signing key for a request comes from: the user record, or a
/// PEM blob supplied by the caller out-of-band.
#[derive(Debug, Clone)]
pub enum PrivateKeySource {
    Stored,
    Provided(String),
}

/// A generated key pair plus the download file names derived from the
/// user's email address.
#[derive(Debug, Clone)]
pub struct KeyPairArtifacts {
    pub key_pair: KeyPair,
    pub private_key_filename: String,
    pub public_key_filename: String,
}

#[derive(Debug, Clone)]
pub struct CertificateArtifacts {
    pub certificate_pem: String,
    pub filename: String,
}

/// Result of the one-shot provisioning path for new users.
#[derive(Debug, Clone)]
pub struct ProvisionedIdentity {
    pub key_pair: KeyPair,
    pub certificate_pem: String,
    pub private_key_filename: String,
    pub public_key_filename: String,
    pub certificate_filename: String,
}

/// A signed document ready to hand back to the caller.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// SHA-256 of the signed output, hex encoded.
    pub sha256: String,
}

/// Facade over the core operations, bound to a user store handle and a
/// configuration. One instance per request scope is fine; it keeps no
/// state of its own.
pub struct SigningService<'a, S: UserStore> {
    store: &'a S,
    config: Config,
}

impl<'a, S: UserStore> SigningService<'a, S> {
    pub fn new(store: &'a S, config: Config) -> Self {
        SigningService { store, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generate a key pair for the user and persist it. The private half is
    /// only stored when plaintext key storage is allowed by configuration;
    /// either way the caller receives both PEMs.
    pub fn create_key_pair(&self, user_id: &str) -> Result<KeyPairArtifacts, Error> {
        let user = self.required_user(user_id)?;
        let key_pair = generate_key_pair()?;

        let persist_private = self.config.allow_plaintext_key_storage;
        if !persist_private {
            log::info!(
                "Plaintext key storage disabled; only the public key of `{}` is persisted.",
                user.email
            );
        }
        self.store.store_key_pair(user_id, &key_pair, persist_private)?;

        Ok(KeyPairArtifacts {
            key_pair,
            private_key_filename: pem_filename(&user.email, "private-key.pem"),
            public_key_filename: pem_filename(&user.email, "public-key.pem"),
        })
    }

    /// Issue a self-signed certificate from the user's stored identity and
    /// key material, and persist it.
    pub fn create_certificate(&self, user_id: &str) -> Result<CertificateArtifacts, Error> {
        let user = self.required_user(user_id)?;
        let signer = SignerIdentity::from_record(&user);

        let certificate_pem = issue_certificate(&signer, &self.config.certificate)?;
        self.store.store_certificate(user_id, &certificate_pem)?;

        Ok(CertificateArtifacts {
            certificate_pem,
            filename: pem_filename(&user.email, "cert.pem"),
        })
    }

    /// One-shot provisioning for users that have neither keys nor a
    /// certificate yet.
    pub fn create_key_and_certificate(&self, user_id: &str) -> Result<ProvisionedIdentity, Error> {
        let user = self.required_user(user_id)?;

        let key_pair = generate_key_pair()?;
        let signer = SignerIdentity::new(user.name.clone(), user.email.clone())
            .with_private_key(key_pair.private_key_pem.clone());
        let certificate_pem = issue_certificate(&signer, &self.config.certificate)?;

        self.store
            .store_key_pair(user_id, &key_pair, self.config.allow_plaintext_key_storage)?;
        self.store.store_certificate(user_id, &certificate_pem)?;

        Ok(ProvisionedIdentity {
            key_pair,
            certificate_pem,
            private_key_filename: pem_filename(&user.email, "private-key.pem"),
            public_key_filename: pem_filename(&user.email, "public-key.pem"),
            certificate_filename: pem_filename(&user.email, "key-cert.pem"),
        })
    }

    /// The user's stored key pair, if any, with download file names.
    pub fn get_key_pair(&self, user_id: &str) -> Result<Option<KeyPairArtifacts>, Error> {
        let user = self.required_user(user_id)?;
        let (private_key_pem, public_key_pem) = match (user.private_key_pem, user.public_key_pem) {
            (Some(private_key), Some(public_key)) => (private_key, public_key),
            _ => return Ok(None),
        };
        Ok(Some(KeyPairArtifacts {
            key_pair: KeyPair {
                private_key_pem,
                public_key_pem,
            },
            private_key_filename: pem_filename(&user.email, "private-key.pem"),
            public_key_filename: pem_filename(&user.email, "public-key.pem"),
        }))
    }

    /// The user's stored certificate, if any.
    pub fn get_certificate(&self, user_id: &str) -> Result<Option<CertificateArtifacts>, Error> {
        let user = self.required_user(user_id)?;
        Ok(user.certificate_pem.map(|certificate_pem| CertificateArtifacts {
            certificate_pem,
            filename: pem_filename(&user.email, "cert.pem"),
        }))
    }

    /// Sign `pdf_bytes` on behalf of a registered user. The signing key is
    /// taken from the record or supplied by the caller, depending on
    /// `key_source`; the certificate always comes from the record.
    pub fn sign_document(
        &self,
        user_id: &str,
        file_name: &str,
        pdf_bytes: &[u8],
        reason: Option<&str>,
        location: Option<&str>,
        key_source: PrivateKeySource,
    ) -> Result<SignedDocument, Error> {
        let user = self.required_user(user_id)?;

        let private_key = match key_source {
            PrivateKeySource::Stored => user.private_key_pem.clone().ok_or(Error::SignerNotReady)?,
            PrivateKeySource::Provided(pem) => pem,
        };
        let certificate = user.certificate_pem.clone().ok_or(Error::SignerNotReady)?;

        let signer = SignerIdentity::new(user.name, user.email)
            .with_private_key(private_key)
            .with_certificate(certificate);

        let bytes = sign_pdf(pdf_bytes, &signer, reason, location)?;
        let sha256 = sha256_hex(&bytes);

        Ok(SignedDocument {
            bytes,
            file_name: file_name.replace(".pdf", "-signed.pdf"),
            sha256,
        })
    }

    /// Verify a document against the pool of all registered users holding a
    /// certificate. The pool is read fresh from the store on every call.
    pub fn verify_document(&self, pdf_bytes: &[u8]) -> Result<VerificationOutcome, Error> {
        let trusted_signers = self.store.trusted_signers()?;
        Ok(verify_document(
            pdf_bytes,
            &trusted_signers,
            self.config.multi_signature_policy,
        ))
    }

    fn required_user(&self, user_id: &str) -> Result<UserRecord, Error> {
        self.store.fetch_user(user_id)?.ok_or(Error::UserNotFound)
    }
}

fn pem_filename(email: &str, suffix: &str) -> String {
    format!("{}-{}", email.replace('.', "_").to_lowercase(), suffix)
}

fn sha256_hex(bytes: &[u8]) -> String {
    to_hex(&Sha256::digest(bytes))
}
