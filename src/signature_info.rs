use crate::signer::SignerIdentity;
use chrono::Utc;

/// Default name of the signature form field.
pub const SIGNATURE_FIELD_NAME: &str = "Signature1";

/// AcroForm SigFlags: SignaturesExist | AppendOnly ("certify and sign").
pub const SIG_FLAGS: i64 = 3;

/// Annotation flags on the signature widget (Print | Locked).
pub const FIELD_FLAGS: i64 = 132;

/// DocMDP access permission: no changes to the document are allowed.
pub const DOC_MDP_NO_CHANGES: i64 = 1;

/// The signing metadata embedded into the signature dictionary.
///
/// Built once per signing call; the engine turns it into the `/V` value of
/// an auto-placed `Signature1` field.
#[derive(Debug, Clone)]
pub struct SignatureDescriptor {
    pub field_name: String,
    pub signer_name: String,
    pub reason: String,
    pub location: Option<String>,
    /// Signer email, stored as `/ContactInfo`.
    pub contact: String,
    /// PDF date string, `D:YYYYMMDDHHMMSS+00'00'`.
    pub signing_date: String,
}

impl SignatureDescriptor {
    /// Descriptor for a certification signature.
    ///
    /// An absent or empty reason is replaced by
    /// `Document signed by {signer name}`.
    pub fn certification(
        signer: &SignerIdentity,
        reason: Option<&str>,
        location: Option<&str>,
    ) -> Self {
        let reason = match reason {
            Some(reason) if !reason.is_empty() => reason.to_owned(),
            _ => format!("Document signed by {}", signer.name),
        };

        SignatureDescriptor {
            field_name: SIGNATURE_FIELD_NAME.to_owned(),
            signer_name: signer.name.clone(),
            reason,
            location: location.filter(|location| !location.is_empty()).map(str::to_owned),
            contact: signer.email.clone(),
            signing_date: pdf_date_now(),
        }
    }
}

/// Current UTC time in the PDF date string format.
fn pdf_date_now() -> String {
    Utc::now().format("D:%Y%m%d%H%M%S+00'00'").to_string()
}
