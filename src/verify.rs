use crate::acro_form::{scan_signature_fields, EmbeddedSignature, FormScan};
use crate::byte_range::ByteRange;
use crate::error::Error;
use cryptographic_message_syntax::SignedData;
use lopdf::Document;
use serde::Serialize;
use x509_certificate::CapturedX509Certificate;

/// One entry of the trusted signer pool: a registered user that currently
/// holds a certificate. The pool is sourced fresh for every verification
/// call so newly issued or removed certificates take effect immediately.
#[derive(Debug, Clone)]
pub struct TrustedSigner {
    pub email: String,
    pub certificate_pem: String,
}

/// How per-signature verdicts combine when a document carries more than
/// one embedded signature.
///
/// `LatestOnly` reproduces the behavior of the system this replaces, which
/// kept only the outcome of the last signature it processed. `RequireAll`
/// is the default here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiSignaturePolicy {
    #[default]
    RequireAll,
    RequireAny,
    LatestOnly,
}

/// Metadata extracted from the first signature field of a validated
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureMetadata {
    pub name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    /// The signature's `/M` modification time string.
    pub data: Option<String>,
}

/// Either extracted metadata or a descriptive note on why none could be
/// extracted (no form, no fields, no signature field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SignatureReport {
    Details(SignatureMetadata),
    Message(String),
}

/// The verdict of a verification call.
///
/// A cryptographically invalid or untrusted signature is a normal negative
/// result; `error` is only populated for structural failures (unreadable
/// document, corrupt signature container, out-of-range ByteRange).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub validated: bool,
    pub signatures: Option<SignatureReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationOutcome {
    fn rejected() -> Self {
        VerificationOutcome {
            validated: false,
            signatures: None,
            error: None,
        }
    }

    fn rejected_with_message(message: &str) -> Self {
        VerificationOutcome {
            validated: false,
            signatures: Some(SignatureReport::Message(message.to_owned())),
            error: None,
        }
    }

    fn structural(error: &Error) -> Self {
        VerificationOutcome {
            validated: false,
            signatures: None,
            error: Some(error.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// The three verification axes checked for every embedded signature.
#[derive(Debug, Clone, Copy)]
struct SignatureCheck {
    hash_ok: bool,
    signature_ok: bool,
    cert_ok: bool,
}

impl SignatureCheck {
    fn passed(&self) -> bool {
        self.hash_ok && self.signature_ok && self.cert_ok
    }
}

/// Verify a signed document against a pool of trusted signers.
///
/// The call walks the state machine
/// `CryptoCheck -> MetadataExtraction -> TrustMatch`; any failing stage
/// rejects. Trust is decided by certificate identity: the embedded
/// certificate that verified the signature must be byte-identical to a
/// pool certificate. The declared signer name is reported as metadata and
/// plays no part in the match.
pub fn verify_document(
    pdf_bytes: &[u8],
    trusted_signers: &[TrustedSigner],
    policy: MultiSignaturePolicy,
) -> VerificationOutcome {
    match verify_inner(pdf_bytes, trusted_signers, policy) {
        Ok(outcome) => outcome,
        Err(err) => {
            log::warn!("Verification failed structurally: {}", err);
            VerificationOutcome::structural(&err)
        }
    }
}

fn verify_inner(
    pdf_bytes: &[u8],
    trusted_signers: &[TrustedSigner],
    policy: MultiSignaturePolicy,
) -> Result<VerificationOutcome, Error> {
    let document = Document::load_mem(pdf_bytes)
        .map_err(|err| Error::VerificationStructural(format!("could not parse document: {}", err)))?;

    let signatures = match scan_signature_fields(&document)? {
        FormScan::Signatures(signatures) => signatures,
        absent => {
            // Reported as a descriptive result rather than an error.
            let message = absent.absence_message().unwrap_or("Document is not signed");
            return Ok(VerificationOutcome::rejected_with_message(message));
        }
    };

    let trusted_der = trusted_pool_der(trusted_signers);

    let mut checks = Vec::with_capacity(signatures.len());
    for signature in &signatures {
        checks.push(check_signature(pdf_bytes, signature, &trusted_der)?);
    }

    if !evaluate(&checks, policy) {
        // Cryptographic failure carries no signature metadata.
        return Ok(VerificationOutcome::rejected());
    }

    let first = &signatures[0];
    Ok(VerificationOutcome {
        validated: true,
        signatures: Some(SignatureReport::Details(SignatureMetadata {
            name: first.name.clone(),
            reason: first.reason.clone(),
            location: first.location.clone(),
            data: first.modified.clone(),
        })),
        error: None,
    })
}

fn evaluate(checks: &[SignatureCheck], policy: MultiSignaturePolicy) -> bool {
    if checks.is_empty() {
        return false;
    }
    match policy {
        MultiSignaturePolicy::RequireAll => checks.iter().all(SignatureCheck::passed),
        MultiSignaturePolicy::RequireAny => checks.iter().any(|check| check.passed()),
        MultiSignaturePolicy::LatestOnly => checks[checks.len() - 1].passed(),
    }
}

/// DER forms of the pool certificates. A pool entry that fails to parse is
/// skipped (and can then never match), not fatal for the whole call.
fn trusted_pool_der(trusted_signers: &[TrustedSigner]) -> Vec<Vec<u8>> {
    trusted_signers
        .iter()
        .filter_map(|signer| {
            let parsed = CapturedX509Certificate::from_pem(signer.certificate_pem.as_bytes())
                .and_then(|certificate| Ok(certificate.encode_der()?));
            match parsed {
                Ok(der) => Some(der),
                Err(err) => {
                    log::warn!("Skipping unreadable pool certificate for `{}`: {}", signer.email, err);
                    None
                }
            }
        })
        .collect()
}

fn check_signature(
    pdf_bytes: &[u8],
    signature: &EmbeddedSignature,
    trusted_der: &[Vec<u8>],
) -> Result<SignatureCheck, Error> {
    let contents = definite_der_slice(&signature.contents)?;
    let signed_data = SignedData::parse_ber(contents).map_err(|err| {
        Error::VerificationStructural(format!("corrupt signature container: {}", err))
    })?;

    let byte_range = ByteRange::from_array(&signature.byte_range)?;
    let content = byte_range.signed_bytes(pdf_bytes)?;

    let mut hash_ok = true;
    let mut signature_ok = true;
    let mut found_signer = false;
    for signer in signed_data.signers() {
        found_signer = true;
        hash_ok &= signer.verify_message_digest_with_content(&content).is_ok();
        signature_ok &= signer.verify_signature_with_signed_data(&signed_data).is_ok();
    }
    if !found_signer {
        hash_ok = false;
        signature_ok = false;
    }

    let cert_ok = signed_data.certificates().any(|certificate| {
        certificate
            .encode_der()
            .map(|der| trusted_der.iter().any(|trusted| *trusted == der))
            .unwrap_or(false)
    });

    Ok(SignatureCheck {
        hash_ok,
        signature_ok,
        cert_ok,
    })
}

/// The `/Contents` window is zero padded past the end of the DER object;
/// slice the container to its encoded length before parsing.
fn definite_der_slice(bytes: &[u8]) -> Result<&[u8], Error> {
    if bytes.len() < 2 {
        return Err(Error::VerificationStructural(
            "signature contents too short".to_owned(),
        ));
    }
    let length_byte = bytes[1];
    let (header, length) = if length_byte & 0x80 == 0 {
        (2, length_byte as usize)
    } else {
        let count = (length_byte & 0x7f) as usize;
        if count == 0 || count > 8 || bytes.len() < 2 + count {
            return Err(Error::VerificationStructural(
                "signature contents has no definite length".to_owned(),
            ));
        }
        let length = bytes[2..2 + count]
            .iter()
            .fold(0usize, |acc, &byte| (acc << 8) | byte as usize);
        (2 + count, length)
    };

    let end = header + length;
    if end > bytes.len() {
        return Err(Error::VerificationStructural(
            "signature contents shorter than its declared length".to_owned(),
        ));
    }
    Ok(&bytes[..end])
}
