use crate::acro_form::{deref, existing_form};
use crate::byte_range::{
    find_contents_window, patch_byte_range, write_signature, ByteRange, BYTE_RANGE_PLACEHOLDER,
    SIGNATURE_RESERVED_BYTES,
};
use crate::error::Error;
use crate::signature_info::{SignatureDescriptor, DOC_MDP_NO_CHANGES, FIELD_FLAGS, SIG_FLAGS};
use crate::signer::SignerIdentity;
use cryptographic_message_syntax::SignedDataBuilder;
use lopdf::{dictionary, IncrementalDocument, Object, ObjectId, StringFormat};

/// Structural gate applied before any PDF parsing.
const PDF_MAGIC: &[u8] = b"%PDF-1.";

/// Embed a CMS certification signature into `pdf_bytes`.
///
/// The output is the original bytes followed by one incremental revision:
/// a `Signature1` field holding the signature dictionary, the AcroForm
/// update that certifies the document, and the patched ByteRange. The
/// signature itself is a detached PKCS#7 object over both byte spans
/// around the `/Contents` window, digest SHA-256.
///
/// An absent or empty `reason` becomes `Document signed by {name}`.
pub fn sign_pdf(
    pdf_bytes: &[u8],
    signer: &SignerIdentity,
    reason: Option<&str>,
    location: Option<&str>,
) -> Result<Vec<u8>, Error> {
    if !pdf_bytes.starts_with(PDF_MAGIC) {
        return Err(Error::InvalidDocumentFormat);
    }
    if !signer.is_ready_to_sign() {
        return Err(Error::SignerNotReady);
    }

    let descriptor = SignatureDescriptor::certification(signer, reason, location);

    // The key and certificate are used as loaded. The system this replaces
    // bounced both through an in-memory PKCS#12 container first; that round
    // trip added nothing and is gone.
    let signing_key = signer.signing_key()?;
    let certificate = signer.captured_certificate()?;

    let mut document = PdfSigningDocument::read_from(pdf_bytes)?;
    let mut serialized = document.append_signature_revision(&descriptor)?;

    let (contents_start, contents_end) =
        find_contents_window(&serialized, SIGNATURE_RESERVED_BYTES * 2)?;
    let byte_range = ByteRange::around_contents(contents_start, contents_end, serialized.len());
    patch_byte_range(&mut serialized, &byte_range)?;

    let signed_bytes = byte_range.signed_bytes(&serialized)?;
    let signature_der = SignedDataBuilder::default()
        .content_external(signed_bytes)
        .certificate(certificate.clone())
        .signer(signer.cms_signer(&signing_key, certificate))
        .build_der()
        .map_err(|err| Error::Signing(err.to_string()))?;

    write_signature(&mut serialized, contents_start, &signature_der)?;

    log::info!(
        "Signed document for `{}`, signature object of {} bytes.",
        descriptor.signer_name,
        signature_der.len()
    );

    Ok(serialized)
}

/// A PDF being extended with a signing revision. Wraps the incremental
/// document so the previous revisions are kept byte for byte.
pub struct PdfSigningDocument {
    raw_document: IncrementalDocument,
}

impl PdfSigningDocument {
    pub fn read_from(pdf_bytes: &[u8]) -> Result<Self, Error> {
        let raw_document = IncrementalDocument::load_from(pdf_bytes)?;
        Ok(PdfSigningDocument { raw_document })
    }

    /// Append the revision carrying the signature dictionary and the
    /// AcroForm/page updates, then serialize the whole document with
    /// placeholder `/ByteRange` and `/Contents` values.
    fn append_signature_revision(
        &mut self,
        descriptor: &SignatureDescriptor,
    ) -> Result<Vec<u8>, Error> {
        // Version 1.5 is the minimum required for this signature layout.
        self.raw_document.new_document.version = "1.5".to_owned();

        // Everything needed from the previous revisions is collected first,
        // since the new revision is built while they stay untouched.
        let prev = self.raw_document.get_prev_documents();
        let catalog_id = prev.trailer.get(b"Root")?.as_reference()?;
        let page_id = *prev
            .get_pages()
            .values()
            .next()
            .ok_or_else(|| Error::Signing("document has no pages".to_owned()))?;
        let existing_acro_form = existing_form(prev)?;
        let page_annotations: Vec<Object> = {
            let page = prev.get_object(page_id)?.as_dict()?;
            match page.get(b"Annots") {
                Ok(object) => deref(prev, object)?.as_array()?.clone(),
                Err(_) => Vec::new(),
            }
        };

        let signature_id = self.add_signature_dictionary(descriptor);
        let widget_id = self.add_signature_widget(descriptor, signature_id, page_id);

        // AcroForm: extend the existing form or start a fresh one. SigFlags 3
        // marks the form as certify-and-sign.
        let (mut form_dictionary, mut fields) =
            existing_acro_form.unwrap_or_else(|| (dictionary! {}, Vec::new()));
        fields.push(Object::Reference(widget_id));
        form_dictionary.set("Fields", Object::Array(fields));
        form_dictionary.set("SigFlags", Object::Integer(SIG_FLAGS));
        let form_id = self.raw_document.new_document.add_object(form_dictionary);

        self.raw_document
            .opt_clone_object_to_new_document(catalog_id)?;
        let catalog = self
            .raw_document
            .new_document
            .get_object_mut(catalog_id)?
            .as_dict_mut()?;
        catalog.set("AcroForm", Object::Reference(form_id));
        catalog.set(
            "Perms",
            Object::Dictionary(dictionary! {
                "DocMDP" => Object::Reference(signature_id),
            }),
        );

        self.raw_document.opt_clone_object_to_new_document(page_id)?;
        let page = self
            .raw_document
            .new_document
            .get_object_mut(page_id)?
            .as_dict_mut()?;
        let mut annotations = page_annotations;
        annotations.push(Object::Reference(widget_id));
        page.set("Annots", Object::Array(annotations));

        let mut buffer = Vec::new();
        self.raw_document.save_to(&mut buffer)?;
        Ok(buffer)
    }

    fn add_signature_dictionary(&mut self, descriptor: &SignatureDescriptor) -> ObjectId {
        let mut signature_dictionary = dictionary! {
            "Type" => "Sig",
            "Filter" => "Adobe.PPKLite",
            "SubFilter" => "adbe.pkcs7.detached",
            "ByteRange" => Object::Array(vec![
                0.into(),
                BYTE_RANGE_PLACEHOLDER.into(),
                BYTE_RANGE_PLACEHOLDER.into(),
                BYTE_RANGE_PLACEHOLDER.into(),
            ]),
            "Contents" => Object::String(
                vec![0u8; SIGNATURE_RESERVED_BYTES],
                StringFormat::Hexadecimal,
            ),
            "Name" => Object::string_literal(descriptor.signer_name.clone()),
            "Reason" => Object::string_literal(descriptor.reason.clone()),
            "ContactInfo" => Object::string_literal(descriptor.contact.clone()),
            "M" => Object::string_literal(descriptor.signing_date.clone()),
            // Certification semantics: the DocMDP transform forbids further
            // changes without invalidating this signature.
            "Reference" => Object::Array(vec![Object::Dictionary(dictionary! {
                "Type" => "SigRef",
                "TransformMethod" => "DocMDP",
                "TransformParams" => Object::Dictionary(dictionary! {
                    "Type" => "TransformParams",
                    "P" => Object::Integer(DOC_MDP_NO_CHANGES),
                    "V" => Object::Name(b"1.2".to_vec()),
                }),
            })]),
        };
        if let Some(location) = &descriptor.location {
            signature_dictionary.set("Location", Object::string_literal(location.clone()));
        }
        self.raw_document
            .new_document
            .add_object(signature_dictionary)
    }

    fn add_signature_widget(
        &mut self,
        descriptor: &SignatureDescriptor,
        signature_id: ObjectId,
        page_id: ObjectId,
    ) -> ObjectId {
        // Auto-placed field: a zero rectangle keeps the widget invisible.
        self.raw_document.new_document.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Sig",
            "T" => Object::string_literal(descriptor.field_name.clone()),
            "F" => Object::Integer(FIELD_FLAGS),
            "Rect" => Object::Array(vec![0.into(), 0.into(), 0.into(), 0.into()]),
            "V" => Object::Reference(signature_id),
            "P" => Object::Reference(page_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_signer() -> SignerIdentity {
        SignerIdentity::new("Ana Silva".to_owned(), "ana@example.com".to_owned())
            .with_private_key("pem".to_owned())
            .with_certificate("pem".to_owned())
    }

    #[test]
    fn non_pdf_input_is_rejected_before_any_work() {
        let err = sign_pdf(b"PK\x03\x04 not a pdf", &ready_signer(), None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidDocumentFormat));
    }

    #[test]
    fn unready_signer_is_rejected() {
        let signer = SignerIdentity::new("Ana Silva".to_owned(), "ana@example.com".to_owned());
        let err = sign_pdf(b"%PDF-1.4\n", &signer, None, None).unwrap_err();
        assert!(matches!(err, Error::SignerNotReady));
    }

    #[test]
    fn magic_gate_checks_the_version_prefix() {
        // `%PDF-2` style headers are outside the supported gate.
        let err = sign_pdf(b"%PDF-2.0\n", &ready_signer(), None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidDocumentFormat));
    }
}
