use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_certify::{
    generate_key_pair, issue_certificate, sign_pdf, verify_document, CertificateOptions, Config,
    Error, InMemoryUserStore, MultiSignaturePolicy, PrivateKeySource, SignatureReport,
    SignerIdentity, SigningService, TrustedSigner, UserRecord, UserStore,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A one-page document with a short text stream, built the same way the
/// documents under test would be in production.
fn minimal_pdf() -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 36.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal("Hello World")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = document.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content encodes"),
    ));
    let page_id = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    document.save_to(&mut buffer).expect("document serializes");
    buffer
}

fn provisioned_signer(name: &str, email: &str) -> SignerIdentity {
    let key_pair = generate_key_pair().expect("key generation");
    let signer = SignerIdentity::new(name.to_owned(), email.to_owned())
        .with_private_key(key_pair.private_key_pem);
    let certificate =
        issue_certificate(&signer, &CertificateOptions::default()).expect("issuance");
    signer.with_certificate(certificate)
}

fn pool_for(signer: &SignerIdentity) -> Vec<TrustedSigner> {
    vec![TrustedSigner {
        email: signer.email.clone(),
        certificate_pem: signer.certificate.clone().expect("certificate present"),
    }]
}

#[test]
fn sign_then_verify_round_trip() {
    init_logging();
    let original = minimal_pdf();
    let signer = provisioned_signer("Ana Silva", "ana@example.com");

    let signed = sign_pdf(&original, &signer, Some("Contract approval"), Some("Lisbon"))
        .expect("signing succeeds");

    // Incremental update: the original bytes are preserved verbatim.
    assert!(signed.starts_with(&original));
    assert!(signed.len() > original.len());

    let outcome = verify_document(&signed, &pool_for(&signer), MultiSignaturePolicy::default());
    assert!(outcome.error.is_none(), "unexpected error: {:?}", outcome.error);
    assert!(outcome.validated);

    match outcome.signatures {
        Some(SignatureReport::Details(metadata)) => {
            assert_eq!(metadata.name.as_deref(), Some("Ana Silva"));
            assert_eq!(metadata.reason.as_deref(), Some("Contract approval"));
            assert_eq!(metadata.location.as_deref(), Some("Lisbon"));
            let date = metadata.data.expect("signing date present");
            assert!(date.starts_with("D:"));
        }
        other => panic!("expected signature metadata, found {:?}", other),
    }
}

#[test]
fn empty_reason_is_replaced_by_the_default() {
    init_logging();
    let signer = provisioned_signer("Ana Silva", "ana@example.com");
    let signed = sign_pdf(&minimal_pdf(), &signer, Some(""), None).expect("signing succeeds");

    let outcome = verify_document(&signed, &pool_for(&signer), MultiSignaturePolicy::default());
    assert!(outcome.validated);
    match outcome.signatures {
        Some(SignatureReport::Details(metadata)) => {
            assert_eq!(
                metadata.reason.as_deref(),
                Some("Document signed by Ana Silva")
            );
        }
        other => panic!("expected signature metadata, found {:?}", other),
    }
}

#[test]
fn tampering_with_signed_content_invalidates_the_document() {
    init_logging();
    let signer = provisioned_signer("Ana Silva", "ana@example.com");
    let mut signed = sign_pdf(&minimal_pdf(), &signer, None, None).expect("signing succeeds");

    // Flip one byte of the original page text, inside the signed range.
    let needle = b"Hello World";
    let at = signed
        .windows(needle.len())
        .position(|window| window == needle)
        .expect("page text present");
    signed[at] ^= 0x01;

    let outcome = verify_document(&signed, &pool_for(&signer), MultiSignaturePolicy::default());
    assert!(!outcome.validated);
    // A hash mismatch is a negative verdict, not a structural error.
    assert!(outcome.error.is_none());
}

#[test]
fn verification_against_an_empty_pool_fails() {
    init_logging();
    let signer = provisioned_signer("Ana Silva", "ana@example.com");
    let signed = sign_pdf(&minimal_pdf(), &signer, None, None).expect("signing succeeds");

    let outcome = verify_document(&signed, &[], MultiSignaturePolicy::default());
    assert!(!outcome.validated);
    assert!(outcome.error.is_none());
}

#[test]
fn verification_against_another_signers_pool_fails() {
    init_logging();
    let ana = provisioned_signer("Ana Silva", "ana@example.com");
    let bruno = provisioned_signer("Bruno Costa", "bruno@example.com");

    let signed = sign_pdf(&minimal_pdf(), &ana, None, None).expect("signing succeeds");
    let outcome = verify_document(&signed, &pool_for(&bruno), MultiSignaturePolicy::default());
    assert!(!outcome.validated);
}

#[test]
fn unsigned_documents_report_the_missing_form() {
    init_logging();
    let outcome = verify_document(&minimal_pdf(), &[], MultiSignaturePolicy::default());
    assert!(!outcome.validated);
    assert_eq!(
        outcome.signatures,
        Some(SignatureReport::Message(
            "Document has no interactive form".to_owned()
        ))
    );
}

#[test]
fn non_pdf_input_is_rejected_without_output() {
    init_logging();
    let signer = provisioned_signer("Ana Silva", "ana@example.com");
    let err = sign_pdf(b"plain text, not a document", &signer, None, None).unwrap_err();
    assert!(matches!(err, Error::InvalidDocumentFormat));
}

#[test]
fn issued_certificates_differ_per_issuance_but_both_verify() {
    init_logging();
    let key_pair = generate_key_pair().expect("key generation");
    let signer = SignerIdentity::new("Ana Silva".to_owned(), "ana@example.com".to_owned())
        .with_private_key(key_pair.private_key_pem);
    let options = CertificateOptions::default();

    let first = issue_certificate(&signer, &options).expect("first issuance");
    let second = issue_certificate(&signer, &options).expect("second issuance");
    assert_ne!(first, second);

    // Each certificate on its own supports a full sign/verify cycle.
    for certificate in [first, second] {
        let signer = signer.clone().with_certificate(certificate);
        let signed = sign_pdf(&minimal_pdf(), &signer, None, None).expect("signing succeeds");
        let outcome =
            verify_document(&signed, &pool_for(&signer), MultiSignaturePolicy::default());
        assert!(outcome.validated);
    }
}

#[test]
fn service_provisions_signs_and_verifies() {
    init_logging();
    let store = InMemoryUserStore::new();
    store.insert_user("1", UserRecord::new("Ana Silva", "ana@example.com"));
    let service = SigningService::new(&store, Config::default());

    service.create_key_and_certificate("1").expect("provisioning");

    let signed = service
        .sign_document(
            "1",
            "contract.pdf",
            &minimal_pdf(),
            None,
            None,
            PrivateKeySource::Stored,
        )
        .expect("signing succeeds");
    assert_eq!(signed.file_name, "contract-signed.pdf");
    assert_eq!(signed.sha256.len(), 64);

    let outcome = service.verify_document(&signed.bytes).expect("verification runs");
    assert!(outcome.validated);
}

#[test]
fn out_of_band_keys_sign_when_storage_keeps_no_private_key() {
    init_logging();
    let store = InMemoryUserStore::new();
    store.insert_user("1", UserRecord::new("Ana Silva", "ana@example.com"));

    let mut config = Config::default();
    config.allow_plaintext_key_storage = false;
    let service = SigningService::new(&store, config);

    // Provision with the private key kept by the caller only.
    let artifacts = service.create_key_pair("1").expect("key generation");
    let signer = SignerIdentity::new("Ana Silva".to_owned(), "ana@example.com".to_owned())
        .with_private_key(artifacts.key_pair.private_key_pem.clone());
    let certificate =
        issue_certificate(&signer, &CertificateOptions::default()).expect("issuance");
    store
        .store_certificate("1", &certificate)
        .expect("certificate persists");

    // The stored record has no private key, so the stored mode cannot sign.
    let err = service
        .sign_document(
            "1",
            "contract.pdf",
            &minimal_pdf(),
            None,
            None,
            PrivateKeySource::Stored,
        )
        .unwrap_err();
    assert!(matches!(err, Error::SignerNotReady));

    // Supplying the key out-of-band works and verifies.
    let signed = service
        .sign_document(
            "1",
            "contract.pdf",
            &minimal_pdf(),
            None,
            None,
            PrivateKeySource::Provided(artifacts.key_pair.private_key_pem),
        )
        .expect("signing succeeds");
    let outcome = service.verify_document(&signed.bytes).expect("verification runs");
    assert!(outcome.validated);
}
