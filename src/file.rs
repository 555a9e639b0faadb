use actix_web::web::{Bytes, BytesMut};
use futures_core::Stream;
use std::{
    path::Path,
    pin::Pin,
    task::{Context, Poll},
};
use streem::IntoStreamer;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};
use tokio_util::codec::{BytesCodec, FramedRead};

pub(crate) struct File {
    inner: tokio::fs::File,
}

impl File {
    pub(crate) async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(File {
            inner: tokio::fs::File::open(path).await?,
        })
    }

    pub(crate) async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(File {
            inner: tokio::fs::File::create(path).await?,
        })
    }

    pub(crate) async fn write_from_bytes(&mut self, mut bytes: Bytes) -> std::io::Result<()> {
        self.inner.write_all_buf(&mut bytes).await?;
        Ok(())
    }

    pub(crate) async fn write_from_stream<S, E>(&mut self, stream: S) -> Result<(), E>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: From<std::io::Error>,
    {
        let stream = std::pin::pin!(stream);
        let mut stream = stream.into_streamer();

        while let Some(mut bytes) = stream.try_next().await? {
            self.inner.write_all_buf(&mut bytes).await?;
        }

        Ok(())
    }

    pub(crate) async fn write_from_async_read<R>(&mut self, mut reader: R) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        tokio::io::copy(&mut reader, &mut self.inner).await?;
        Ok(())
    }

    /// Flush buffered writes and make sure they reached the disk
    pub(crate) async fn close(mut self) -> std::io::Result<()> {
        self.inner.flush().await?;
        self.inner.sync_all().await
    }

    pub(crate) fn read_to_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> {
        BytesFreezer::new(FramedRead::new(self.inner, BytesCodec::new()))
    }
}

impl AsyncRead for File {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

pin_project_lite::pin_project! {
    struct BytesFreezer<S> {
        #[pin]
        inner: S,
    }
}

impl<S> BytesFreezer<S> {
    fn new(inner: S) -> Self {
        BytesFreezer { inner }
    }
}

impl<S, E> Stream for BytesFreezer<S>
where
    S: Stream<Item = Result<BytesMut, E>>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project()
            .inner
            .poll_next(cx)
            .map(|opt| opt.map(|res| res.map(BytesMut::freeze)))
    }
}
