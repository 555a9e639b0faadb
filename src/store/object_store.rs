use crate::{
    error_code::ErrorCode,
    store::{ObjectKey, StorageReference, Store, StoreError},
};
use ::object_store::{
    aws::{AmazonS3, AmazonS3Builder},
    path::Path,
    signer::Signer,
    Attribute, Attributes, PutMultipartOpts, WriteMultipart,
};
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

const CHUNK_SIZE: usize = 8_388_608; // 8 Mebibytes, min is 5 (5_242_880);
const MAX_CONCURRENT_PARTS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ObjectError {
    #[error("Failed to configure object storage")]
    Build(#[source] ::object_store::Error),

    #[error("Failed to upload object")]
    Put(#[source] ::object_store::Error),

    #[error("Failed to look up object")]
    Head(#[source] ::object_store::Error),

    #[error("Failed to sign object URL")]
    Sign(#[source] ::object_store::Error),

    #[error("Failed to delete object")]
    Delete(#[source] ::object_store::Error),

    #[error("Failed to reach bucket")]
    Health(#[source] ::object_store::Error),

    #[error("IO Error")]
    Io(#[from] std::io::Error),
}

impl ObjectError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Build(_)
            | Self::Put(_)
            | Self::Head(_)
            | Self::Sign(_)
            | Self::Delete(_)
            | Self::Health(_) => ErrorCode::OBJECT_REQUEST_ERROR,
            Self::Io(_) => ErrorCode::OBJECT_IO_ERROR,
        }
    }

    pub(super) const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Delete(::object_store::Error::NotFound { .. })
                | Self::Head(::object_store::Error::NotFound { .. })
        )
    }
}

/// An S3-compatible bucket, written through multipart uploads and read through presigned URLs
#[derive(Clone)]
pub(crate) struct ObjectStore {
    bucket_name: String,
    signer: Arc<AmazonS3>,
    objects: Arc<dyn ::object_store::ObjectStore>,
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        match self.objects.head(&Path::from("tubely-health-check")).await {
            Ok(_) | Err(::object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(ObjectError::Health(e).into()),
        }
    }

    fn namespace(&self) -> &str {
        &self.bucket_name
    }

    #[tracing::instrument(skip(self, reader))]
    async fn save_async_read<Reader>(
        &self,
        key: &ObjectKey,
        mut reader: Reader,
        content_type: &mime::Mime,
    ) -> Result<StorageReference, StoreError>
    where
        Reader: AsyncRead + Unpin + 'static,
    {
        let path = Path::from(key.as_str());

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let upload = self
            .objects
            .put_multipart_opts(
                &path,
                PutMultipartOpts {
                    attributes,
                    ..Default::default()
                },
            )
            .await
            .map_err(ObjectError::Put)?;

        let mut writer = WriteMultipart::new_with_chunk_size(upload, CHUNK_SIZE);

        if let Err(e) = write_parts(&mut writer, &mut reader).await {
            if let Err(abort) = writer.abort().await {
                tracing::warn!("Failed to abort multipart upload: {abort}");
            }

            return Err(e.into());
        }

        writer.finish().await.map_err(ObjectError::Put)?;

        Ok(StorageReference {
            namespace: self.bucket_name.clone(),
            key: key.clone(),
        })
    }

    async fn signed_url(
        &self,
        reference: &StorageReference,
        expires_in: Duration,
    ) -> Result<Url, StoreError> {
        self.check_namespace(reference)?;

        let path = Path::from(reference.key.as_str());

        self.objects.head(&path).await.map_err(ObjectError::Head)?;

        let url = self
            .signer
            .signed_url(http::Method::GET, &path, expires_in)
            .await
            .map_err(ObjectError::Sign)?;

        Ok(url)
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, reference: &StorageReference) -> Result<(), StoreError> {
        self.check_namespace(reference)?;

        self.objects
            .delete(&Path::from(reference.key.as_str()))
            .await
            .map_err(ObjectError::Delete)?;

        Ok(())
    }
}

async fn write_parts<R>(writer: &mut WriteMultipart, reader: &mut R) -> Result<(), ObjectError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;

        if n == 0 {
            return Ok(());
        }

        writer
            .wait_for_capacity(MAX_CONCURRENT_PARTS)
            .await
            .map_err(ObjectError::Put)?;
        writer.write(&buf[..n]);
    }
}

impl ObjectStore {
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(skip(access_key, secret_key, session_token))]
    pub(crate) fn build(
        endpoint: Option<Url>,
        bucket_name: String,
        use_path_style: bool,
        region: String,
        access_key: String,
        secret_key: String,
        session_token: Option<String>,
    ) -> Result<ObjectStore, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket_name.clone())
            .with_region(region)
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_virtual_hosted_style_request(!use_path_style);

        if let Some(endpoint) = endpoint {
            builder = builder
                .with_allow_http(endpoint.scheme() == "http")
                .with_endpoint(endpoint.as_str().trim_end_matches('/'));
        }

        if let Some(token) = session_token {
            builder = builder.with_token(token);
        }

        let client = Arc::new(builder.build().map_err(ObjectError::Build)?);

        Ok(ObjectStore {
            bucket_name,
            signer: Arc::clone(&client),
            objects: client,
        })
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("bucket_name", &self.bucket_name)
            .field("objects", &self.objects.to_string())
            .finish()
    }
}
