use actix_web::web::{Bytes, BytesMut};
use futures_core::Stream;
use std::collections::VecDeque;
use streem::IntoStreamer;

/// Chunks of a request body collected without copying them into one buffer
#[derive(Clone, Debug, Default)]
pub(crate) struct BytesStream {
    inner: VecDeque<Bytes>,
    total_len: usize,
}

impl BytesStream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(stream))]
    pub(crate) async fn try_from_stream<S, E>(stream: S) -> Result<Self, E>
    where
        S: Stream<Item = Result<Bytes, E>>,
    {
        let stream = std::pin::pin!(stream);
        let mut stream = stream.into_streamer();
        let mut bs = Self::new();

        while let Some(bytes) = stream.try_next().await? {
            bs.add_bytes(bytes);
        }

        tracing::debug!(
            "BytesStream with {} chunks, {} bytes",
            bs.chunks_len(),
            bs.len()
        );

        Ok(bs)
    }

    pub(crate) fn chunks_len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn add_bytes(&mut self, bytes: Bytes) {
        self.total_len += bytes.len();
        self.inner.push_back(bytes);
    }

    pub(crate) fn len(&self) -> usize {
        self.total_len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub(crate) fn into_bytes(mut self) -> Bytes {
        if self.inner.len() == 1 {
            return self.inner.pop_front().unwrap_or_default();
        }

        let mut buf = BytesMut::with_capacity(self.total_len);

        for bytes in self.inner {
            buf.extend_from_slice(&bytes);
        }

        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use actix_web::web::Bytes;

    use super::BytesStream;

    #[test]
    fn joins_chunks() {
        let mut bs = BytesStream::new();
        assert!(bs.is_empty());

        bs.add_bytes(Bytes::from_static(b"abc"));
        bs.add_bytes(Bytes::from_static(b"def"));

        assert_eq!(bs.len(), 6);
        assert_eq!(bs.chunks_len(), 2);
        assert_eq!(bs.into_bytes(), Bytes::from_static(b"abcdef"));
    }
}
