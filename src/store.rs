use std::{fmt::Debug, str::FromStr, time::Duration};

use mime::Mime;
use rand::RngCore;
use tokio::io::AsyncRead;
use url::Url;

use crate::{discover::Orientation, error_code::ErrorCode, formats::VideoFormat};

pub(crate) mod file_store;
pub(crate) mod object_store;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in file store")]
    FileStore(#[source] crate::store::file_store::FileError),

    #[error("Error in object store")]
    ObjectStore(#[source] crate::store::object_store::ObjectError),

    #[error("Requested file is not found")]
    FileNotFound(#[source] std::io::Error),

    #[error("Requested object is not found")]
    ObjectNotFound(#[source] crate::store::object_store::ObjectError),

    #[error("Reference belongs to namespace {found}, not {expected}")]
    ForeignNamespace { expected: String, found: String },

    #[error("Invalid storage reference {0:?}")]
    InvalidReference(String),
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::FileStore(e) => e.error_code(),
            Self::ObjectStore(e) => e.error_code(),
            Self::FileNotFound(_) | Self::ObjectNotFound(_) => ErrorCode::NOT_FOUND,
            Self::ForeignNamespace { .. } => ErrorCode::FOREIGN_NAMESPACE,
            Self::InvalidReference(_) => ErrorCode::INVALID_OBJECT_KEY,
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_)) || matches!(self, Self::ObjectNotFound(_))
    }

    pub(crate) const fn is_forbidden(&self) -> bool {
        match self {
            Self::FileStore(e) => e.is_forbidden(),
            _ => false,
        }
    }
}

impl From<crate::store::file_store::FileError> for StoreError {
    fn from(value: crate::store::file_store::FileError) -> Self {
        match value {
            crate::store::file_store::FileError::Io(e)
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::FileNotFound(e)
            }
            e => Self::FileStore(e),
        }
    }
}

impl From<crate::store::object_store::ObjectError> for StoreError {
    fn from(value: crate::store::object_store::ObjectError) -> Self {
        if value.is_not_found() {
            Self::ObjectNotFound(value)
        } else {
            Self::ObjectStore(value)
        }
    }
}

/// Where a stored video lives, persisted as `<namespace>,<key>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StorageReference {
    pub(crate) namespace: String,
    pub(crate) key: ObjectKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ObjectKey(String);

impl ObjectKey {
    /// `<orientation>/<64 hex chars><extension>`
    pub(crate) fn generate(orientation: Orientation, format: VideoFormat) -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);

        ObjectKey(format!(
            "{}/{}{}",
            orientation.as_prefix(),
            hex::encode(bytes),
            format.file_extension()
        ))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for StorageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.namespace, self.key)
    }
}

impl FromStr for StorageReference {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((namespace, key)) = s.split_once(',') else {
            return Err(StoreError::InvalidReference(s.to_string()));
        };

        if namespace.is_empty() || key.is_empty() || key.contains(',') {
            return Err(StoreError::InvalidReference(s.to_string()));
        }

        Ok(StorageReference {
            namespace: namespace.to_string(),
            key: ObjectKey(key.to_string()),
        })
    }
}

#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// The bucket, or its filesystem equivalent, recorded in every reference this store issues
    fn namespace(&self) -> &str;

    /// Upload the whole of `reader` under `key`. The object is readable once this returns
    async fn save_async_read<Reader>(
        &self,
        key: &ObjectKey,
        reader: Reader,
        content_type: &Mime,
    ) -> Result<StorageReference, StoreError>
    where
        Reader: AsyncRead + Unpin + 'static;

    /// A read-only URL for exactly one object, valid until `expires_in` elapses
    async fn signed_url(
        &self,
        reference: &StorageReference,
        expires_in: Duration,
    ) -> Result<Url, StoreError>;

    async fn remove(&self, reference: &StorageReference) -> Result<(), StoreError>;

    fn check_namespace(&self, reference: &StorageReference) -> Result<(), StoreError> {
        if reference.namespace == self.namespace() {
            Ok(())
        } else {
            Err(StoreError::ForeignNamespace {
                expected: self.namespace().to_string(),
                found: reference.namespace.clone(),
            })
        }
    }
}
