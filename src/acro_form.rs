use crate::error::Error;
use lopdf::{Dictionary, Document, Object};

/// Follow a reference to its object, or hand the object back unchanged.
pub(crate) fn deref<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object, Error> {
    match object {
        Object::Reference(id) => Ok(document.get_object(*id)?),
        other => Ok(other),
    }
}

fn deref_dict<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Dictionary, Error> {
    Ok(deref(document, object)?.as_dict()?)
}

fn string_value(dictionary: &Dictionary, key: &[u8]) -> Option<String> {
    match dictionary.get(key) {
        Ok(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// One signature found in the document's interactive form.
#[derive(Debug, Clone)]
pub(crate) struct EmbeddedSignature {
    pub field_name: Option<String>,
    /// DER/BER signature container, zero padded up to the reserved window.
    pub contents: Vec<u8>,
    pub byte_range: Vec<i64>,
    pub name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    /// Modification time, `/M`.
    pub modified: Option<String>,
}

/// Outcome of walking the interactive form looking for signature fields.
///
/// The absence variants are normal results, not errors: the verifier
/// reports them as descriptive strings instead of failing structurally.
#[derive(Debug)]
pub(crate) enum FormScan {
    Signatures(Vec<EmbeddedSignature>),
    NoAcroForm,
    NoFields,
    NoSignatureField,
}

impl FormScan {
    pub(crate) fn absence_message(&self) -> Option<&'static str> {
        match self {
            FormScan::Signatures(_) => None,
            FormScan::NoAcroForm => Some("Document has no interactive form"),
            FormScan::NoFields => Some("Document form has no fields"),
            FormScan::NoSignatureField => Some("Document has no signature field"),
        }
    }
}

/// Walk Catalog -> AcroForm -> Fields and collect every signature-typed
/// field that carries a value dictionary.
pub(crate) fn scan_signature_fields(document: &Document) -> Result<FormScan, Error> {
    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|err| Error::VerificationStructural(format!("document has no catalog: {}", err)))?;
    let catalog = document
        .get_object(catalog_id)
        .and_then(Object::as_dict)
        .map_err(|err| Error::VerificationStructural(format!("catalog is not a dictionary: {}", err)))?;

    let acro_form = match catalog.get(b"AcroForm") {
        Ok(object) => deref_dict(document, object)?,
        Err(_) => return Ok(FormScan::NoAcroForm),
    };

    let fields = match acro_form.get(b"Fields") {
        Ok(object) => deref(document, object)?.as_array()?,
        Err(_) => return Ok(FormScan::NoFields),
    };
    if fields.is_empty() {
        return Ok(FormScan::NoFields);
    }

    let mut signatures = Vec::new();
    for field in fields {
        let field = deref_dict(document, field)?;
        let is_signature = matches!(field.get(b"FT"), Ok(Object::Name(name)) if name == b"Sig");
        if !is_signature {
            continue;
        }

        let value = match field.get(b"V") {
            Ok(value) => deref_dict(document, value)?,
            // An unsigned signature field; skip it.
            Err(_) => continue,
        };

        let contents = match value.get(b"Contents") {
            Ok(Object::String(bytes, _)) => bytes.clone(),
            _ => {
                return Err(Error::VerificationStructural(
                    "signature value has no Contents entry".to_owned(),
                ))
            }
        };
        let byte_range = match value.get(b"ByteRange") {
            Ok(object) => deref(document, object)?
                .as_array()?
                .iter()
                .map(|entry| entry.as_i64())
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => {
                return Err(Error::VerificationStructural(
                    "signature value has no ByteRange entry".to_owned(),
                ))
            }
        };

        signatures.push(EmbeddedSignature {
            field_name: string_value(field, b"T"),
            contents,
            byte_range,
            name: string_value(value, b"Name"),
            reason: string_value(value, b"Reason"),
            location: string_value(value, b"Location"),
            modified: string_value(value, b"M"),
        });
    }

    if signatures.is_empty() {
        return Ok(FormScan::NoSignatureField);
    }
    Ok(FormScan::Signatures(signatures))
}

/// The previous revision's AcroForm dictionary and its field references,
/// used when a signing revision has to extend an existing form.
pub(crate) fn existing_form(document: &Document) -> Result<Option<(Dictionary, Vec<Object>)>, Error> {
    let catalog_id = document.trailer.get(b"Root")?.as_reference()?;
    let catalog = document.get_object(catalog_id)?.as_dict()?;

    let acro_form = match catalog.get(b"AcroForm") {
        Ok(object) => deref_dict(document, object)?.clone(),
        Err(_) => return Ok(None),
    };

    let fields = match acro_form.get(b"Fields") {
        Ok(object) => deref(document, object)?.as_array()?.clone(),
        Err(_) => Vec::new(),
    };

    Ok(Some((acro_form, fields)))
}
