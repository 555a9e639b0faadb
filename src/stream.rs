use futures_core::Stream;
use std::{
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
};

pin_project_lite::pin_project! {
    pub(crate) struct FromErr<S, E> {
        #[pin]
        inner: S,

        error: PhantomData<E>,
    }
}

/// Convert the error type of a fallible stream
pub(crate) fn from_err<S, T, E1, E2>(stream: S) -> FromErr<S, E2>
where
    S: Stream<Item = Result<T, E1>>,
    E2: From<E1>,
{
    FromErr {
        inner: stream,
        error: PhantomData,
    }
}

impl<S, T, E1, E2> Stream for FromErr<S, E2>
where
    S: Stream<Item = Result<T, E1>>,
    E2: From<E1>,
{
    type Item = Result<T, E2>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project()
            .inner
            .poll_next(cx)
            .map(|opt| opt.map(|res| res.map_err(E2::from)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
