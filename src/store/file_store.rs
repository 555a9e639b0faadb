use crate::{
    error_code::ErrorCode,
    file::File,
    store::{ObjectKey, StorageReference, Store},
};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::io::AsyncRead;
use url::Url;

use super::StoreError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FileError {
    #[error("Failed to read or write file")]
    Io(#[from] std::io::Error),

    #[error("Object key {0:?} is not a relative path")]
    InvalidKey(String),

    #[error("Tried to save over existing file")]
    FileExists,

    #[error("Signing key is unusable")]
    SigningKey,

    #[error("Signature doesn't match the requested file")]
    InvalidSignature,

    #[error("Signed URL has expired")]
    Expired,

    #[error("Public URL can't have file paths appended")]
    PublicUrl,
}

impl FileError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) | Self::SigningKey => ErrorCode::FILE_IO_ERROR,
            Self::InvalidKey(_) => ErrorCode::INVALID_OBJECT_KEY,
            Self::FileExists => ErrorCode::FILE_EXISTS,
            Self::InvalidSignature => ErrorCode::INVALID_SIGNATURE,
            Self::Expired => ErrorCode::SIGNATURE_EXPIRED,
            Self::PublicUrl => ErrorCode::INVALID_PUBLIC_URL,
        }
    }

    pub(super) const fn is_forbidden(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::Expired)
    }
}

/// Stores objects under a root directory and signs URLs that this server verifies itself
#[derive(Clone)]
pub(crate) struct FileStore {
    root_dir: PathBuf,
    namespace: Arc<str>,
    public_url: Url,
    signing_key: Arc<[u8]>,
}

#[async_trait::async_trait(?Send)]
impl Store for FileStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        tokio::fs::metadata(&self.root_dir)
            .await
            .map_err(FileError::from)?;

        Ok(())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    #[tracing::instrument(skip(reader))]
    async fn save_async_read<Reader>(
        &self,
        key: &ObjectKey,
        mut reader: Reader,
        _content_type: &mime::Mime,
    ) -> Result<StorageReference, StoreError>
    where
        Reader: AsyncRead + Unpin + 'static,
    {
        let path = self.path_from_key(key.as_str())?;

        if let Err(e) = self.safe_save_reader(&path, &mut reader).await {
            if !matches!(e, FileError::FileExists) {
                if let Err(remove_err) = self.safe_remove_file(&path).await {
                    tracing::warn!("Failed to clean up {}: {remove_err}", path.display());
                }
            }
            return Err(e.into());
        }

        Ok(StorageReference {
            namespace: self.namespace.to_string(),
            key: key.clone(),
        })
    }

    async fn signed_url(
        &self,
        reference: &StorageReference,
        expires_in: Duration,
    ) -> Result<Url, StoreError> {
        self.check_namespace(reference)?;

        let path = self.path_from_key(reference.key.as_str())?;
        tokio::fs::metadata(&path).await.map_err(FileError::from)?;

        let now = time::OffsetDateTime::now_utc().unix_timestamp();

        Ok(self.sign_at(reference, now, expires_in)?)
    }

    #[tracing::instrument]
    async fn remove(&self, reference: &StorageReference) -> Result<(), StoreError> {
        self.check_namespace(reference)?;

        let path = self.path_from_key(reference.key.as_str())?;

        self.safe_remove_file(path).await?;

        Ok(())
    }
}

impl FileStore {
    #[tracing::instrument(skip(signing_key))]
    pub(crate) async fn build(
        root_dir: PathBuf,
        namespace: String,
        public_url: Url,
        signing_key: Option<String>,
    ) -> color_eyre::Result<Self> {
        tokio::fs::create_dir_all(&root_dir).await?;

        let signing_key: Arc<[u8]> = match signing_key {
            Some(key) => Arc::from(key.into_bytes()),
            None => {
                tracing::warn!("No signing key configured, file URLs won't survive a restart");

                let mut bytes = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut bytes);
                Arc::from(bytes.to_vec())
            }
        };

        Ok(FileStore {
            root_dir,
            namespace: Arc::from(namespace),
            public_url,
            signing_key,
        })
    }

    /// Open the file a signed URL points at, if the signature matches and hasn't expired at `now`
    #[tracing::instrument(skip(signature))]
    pub(crate) async fn open_signed(
        &self,
        namespace: &str,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<File, StoreError> {
        let path = self.verify(namespace, key, expires, signature, now)?;

        let file = File::open(path).await.map_err(FileError::from)?;

        Ok(file)
    }

    fn verify(
        &self,
        namespace: &str,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<PathBuf, FileError> {
        if namespace != &*self.namespace {
            return Err(FileError::InvalidSignature);
        }

        let signature = hex::decode(signature).map_err(|_| FileError::InvalidSignature)?;

        self.mac(namespace, key, expires)?
            .verify_slice(&signature)
            .map_err(|_| FileError::InvalidSignature)?;

        if now > expires {
            return Err(FileError::Expired);
        }

        self.path_from_key(key)
    }

    fn sign_at(
        &self,
        reference: &StorageReference,
        now: i64,
        expires_in: Duration,
    ) -> Result<Url, FileError> {
        let expires = now.saturating_add(i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX));
        let key = reference.key.as_str();

        let signature = self
            .mac(&reference.namespace, key, expires)?
            .finalize()
            .into_bytes();

        let mut url = self.public_url.clone();
        url.path_segments_mut()
            .map_err(|_| FileError::PublicUrl)?
            .pop_if_empty()
            .push("files")
            .push(&reference.namespace)
            .extend(key.split('/'));

        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &hex::encode(signature));

        Ok(url)
    }

    fn mac(&self, namespace: &str, key: &str, expires: i64) -> Result<HmacSha256, FileError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.signing_key).map_err(|_| FileError::SigningKey)?;

        mac.update(namespace.as_bytes());
        mac.update(b"\n");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());

        Ok(mac)
    }

    fn path_from_key(&self, key: &str) -> Result<PathBuf, FileError> {
        let path = Path::new(key);

        let relative = path.components().next().is_some()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !relative {
            return Err(FileError::InvalidKey(key.to_string()));
        }

        Ok(self.root_dir.join(path))
    }

    async fn safe_remove_file<P: AsRef<Path>>(&self, path: P) -> Result<(), FileError> {
        tokio::fs::remove_file(&path).await?;
        self.try_remove_parents(path.as_ref()).await;
        Ok(())
    }

    async fn try_remove_parents(&self, mut path: &Path) {
        while let Some(parent) = path.parent() {
            if parent.ends_with(&self.root_dir) {
                return;
            }

            if tokio::fs::remove_dir(parent).await.is_err() {
                return;
            }

            path = parent;
        }
    }

    async fn safe_save_reader<P: AsRef<Path>>(
        &self,
        to: P,
        input: &mut (impl AsyncRead + Unpin + ?Sized),
    ) -> Result<(), FileError> {
        safe_create_parent(&to).await?;

        if let Err(e) = tokio::fs::metadata(&to).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        } else {
            return Err(FileError::FileExists);
        }

        let mut file = File::create(to).await?;

        file.write_from_async_read(input).await?;
        file.close().await?;

        Ok(())
    }
}

pub(crate) async fn safe_create_parent<P: AsRef<Path>>(path: P) -> Result<(), FileError> {
    if let Some(path) = path.as_ref().parent() {
        tokio::fs::create_dir_all(path).await?;
    }

    Ok(())
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("root_dir", &self.root_dir)
            .field("namespace", &self.namespace)
            .field("public_url", &self.public_url.as_str())
            .field("signing_key", &"redacted")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        discover::Orientation,
        formats::VideoFormat,
        store::{ObjectKey, StorageReference, Store, StoreError},
    };

    use super::{FileError, FileStore};

    async fn store(root: &std::path::Path) -> FileStore {
        FileStore::build(
            root.join("files"),
            String::from("test-videos"),
            "http://localhost:8091/".parse().expect("Valid url"),
            Some(String::from("test-signing-key")),
        )
        .await
        .expect("Built store")
    }

    fn query(url: &url::Url) -> (i64, String) {
        let mut expires = None;
        let mut signature = None;

        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "expires" => expires = Some(value.parse().expect("Numeric expiry")),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        (
            expires.expect("Expiry present"),
            signature.expect("Signature present"),
        )
    }

    #[tokio::test]
    async fn store_sign_fetch_round_trip() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        let key = ObjectKey::generate(Orientation::Portrait, VideoFormat::Mp4);
        let reference = store
            .save_async_read(&key, &b"optimized bytes"[..], &VideoFormat::Mp4.media_type())
            .await
            .expect("Saved");

        assert_eq!(reference.namespace, "test-videos");

        let url = store
            .signed_url(&reference, Duration::from_secs(300))
            .await
            .expect("Signed");

        let expected_path = format!("/files/test-videos/{key}");
        assert_eq!(url.path(), expected_path);

        let (expires, signature) = query(&url);
        let now = time::OffsetDateTime::now_utc().unix_timestamp();

        let path = store
            .verify("test-videos", key.as_str(), expires, &signature, now)
            .expect("Verified");

        assert_eq!(
            tokio::fs::read(path).await.expect("Read file"),
            b"optimized bytes"
        );
    }

    #[tokio::test]
    async fn signatures_expire_after_the_duration() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        let reference: StorageReference = "test-videos,landscape/abc.mp4".parse().expect("Valid");
        let url = store
            .sign_at(&reference, 1_000, Duration::from_secs(300))
            .expect("Signed");

        let (expires, signature) = query(&url);
        assert_eq!(expires, 1_300);

        store
            .verify("test-videos", "landscape/abc.mp4", expires, &signature, 1_299)
            .expect("Valid before expiry");

        let res = store.verify("test-videos", "landscape/abc.mp4", expires, &signature, 1_301);
        assert!(matches!(res, Err(FileError::Expired)));
    }

    #[tokio::test]
    async fn signatures_cover_exactly_one_object() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        let reference: StorageReference = "test-videos,landscape/abc.mp4".parse().expect("Valid");
        let url = store
            .sign_at(&reference, 1_000, Duration::from_secs(300))
            .expect("Signed");
        let (expires, signature) = query(&url);

        let other_key = store.verify("test-videos", "landscape/abd.mp4", expires, &signature, 1_000);
        assert!(matches!(other_key, Err(FileError::InvalidSignature)));

        let extended = store.verify(
            "test-videos",
            "landscape/abc.mp4",
            expires + 3600,
            &signature,
            1_000,
        );
        assert!(matches!(extended, Err(FileError::InvalidSignature)));

        let garbage = store.verify("test-videos", "landscape/abc.mp4", expires, "zz", 1_000);
        assert!(matches!(garbage, Err(FileError::InvalidSignature)));
    }

    #[tokio::test]
    async fn escaping_keys_are_rejected() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        for key in ["../outside.mp4", "/etc/passwd", ""] {
            assert!(
                matches!(store.path_from_key(key), Err(FileError::InvalidKey(_))),
                "{key:?}"
            );
        }
    }

    #[tokio::test]
    async fn remove_cleans_up_empty_prefixes() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        let key = ObjectKey::generate(Orientation::Other, VideoFormat::Mp4);
        let reference = store
            .save_async_read(&key, &b"bytes"[..], &VideoFormat::Mp4.media_type())
            .await
            .expect("Saved");

        store.remove(&reference).await.expect("Removed");

        assert!(!root.path().join("files").join(key.as_str()).exists());
        assert!(!root.path().join("files").join("other").exists());
        assert!(root.path().join("files").exists());

        let err = store.remove(&reference).await.expect_err("Already removed");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn missing_objects_are_not_signed() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        let key = ObjectKey::generate(Orientation::Landscape, VideoFormat::Mp4);
        let reference = StorageReference {
            namespace: String::from("test-videos"),
            key,
        };

        let err = store
            .signed_url(&reference, Duration::from_secs(300))
            .await
            .expect_err("Nothing stored");
        assert!(matches!(err, StoreError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn failed_saves_keep_their_own_error() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        // A trailing slash makes creating the file fail before anything is written
        let key = ObjectKey(String::from("landscape/unwritable.mp4/"));

        let err = store
            .save_async_read(&key, &b"bytes"[..], &VideoFormat::Mp4.media_type())
            .await
            .expect_err("Not saved");

        assert!(!err.is_not_found(), "{err:?}");
        assert!(matches!(err, StoreError::FileStore(FileError::Io(_))));
    }

    #[tokio::test]
    async fn foreign_namespaces_are_refused() {
        let root = tempfile::tempdir().expect("Created tempdir");
        let store = store(root.path()).await;

        let reference: StorageReference = "someone-else,landscape/abc.mp4".parse().expect("Valid");

        let res = store.signed_url(&reference, Duration::from_secs(300)).await;
        assert!(matches!(res, Err(StoreError::ForeignNamespace { .. })));
    }
}
