use crate::error::Error;
use crate::keys::KeyPair;
use crate::verify::TrustedSigner;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// The persisted fields of a registered user, as the core consumes them.
/// Key and certificate fields stay empty until provisioned.
#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
    pub certificate_pem: Option<String>,
}

impl UserRecord {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        UserRecord {
            name: name.into(),
            email: email.into(),
            ..UserRecord::default()
        }
    }
}

/// Contract the core expects from the user record store. Implementations
/// are handed in explicitly per operation; the crate holds no global
/// connection state.
pub trait UserStore {
    /// Look up a user by its opaque id.
    fn fetch_user(&self, user_id: &str) -> Result<Option<UserRecord>, Error>;

    /// Persist a freshly generated key pair on the user record. When
    /// `persist_private` is false only the public half is stored.
    fn store_key_pair(
        &self,
        user_id: &str,
        key_pair: &KeyPair,
        persist_private: bool,
    ) -> Result<(), Error>;

    /// Persist an issued certificate on the user record.
    fn store_certificate(&self, user_id: &str, certificate_pem: &str) -> Result<(), Error>;

    /// All users currently holding a certificate, projected to the
    /// trusted signer pool. Queried fresh on every verification.
    fn trusted_signers(&self) -> Result<Vec<TrustedSigner>, Error>;
}

/// Map-backed store. The `BTreeMap` keeps the trusted pool in a stable
/// order across calls.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: Mutex<BTreeMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        InMemoryUserStore::default()
    }

    pub fn insert_user(&self, user_id: impl Into<String>, record: UserRecord) {
        self.lock().insert(user_id.into(), record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, UserRecord>> {
        // A poisoned lock only happens after a panic elsewhere; the map
        // itself is still usable.
        self.users.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UserStore for InMemoryUserStore {
    fn fetch_user(&self, user_id: &str) -> Result<Option<UserRecord>, Error> {
        Ok(self.lock().get(user_id).cloned())
    }

    fn store_key_pair(
        &self,
        user_id: &str,
        key_pair: &KeyPair,
        persist_private: bool,
    ) -> Result<(), Error> {
        let mut users = self.lock();
        let record = users.get_mut(user_id).ok_or(Error::UserNotFound)?;
        if persist_private {
            record.private_key_pem = Some(key_pair.private_key_pem.clone());
        }
        record.public_key_pem = Some(key_pair.public_key_pem.clone());
        Ok(())
    }

    fn store_certificate(&self, user_id: &str, certificate_pem: &str) -> Result<(), Error> {
        let mut users = self.lock();
        let record = users.get_mut(user_id).ok_or(Error::UserNotFound)?;
        record.certificate_pem = Some(certificate_pem.to_owned());
        Ok(())
    }

    fn trusted_signers(&self) -> Result<Vec<TrustedSigner>, Error> {
        Ok(self
            .lock()
            .values()
            .filter_map(|record| {
                record.certificate_pem.as_ref().map(|certificate| TrustedSigner {
                    email: record.email.clone(),
                    certificate_pem: certificate.clone(),
                })
            })
            .collect())
    }
}
