//! Response body handed to the deployment variants.
//!
//! [`RelayBody`] implements [`http_body::Body`], so an edge host built on
//! hyper can serve it directly. The standalone server pulls it with
//! [`RelayBody::next_chunk`]. Upstream chunks are forwarded as they arrive;
//! nothing is buffered.

use crate::error::FetchError;
use crate::upstream::BodyStream;
use bytes::Bytes;
use futures_util::StreamExt;
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};

pub enum RelayBody {
    /// No body (OPTIONS, HEAD, 204/304)
    Empty,
    /// Short locally generated body, e.g. an error message
    Full(Option<Bytes>),
    /// Upstream body, streamed
    Stream(BodyStream),
}

impl RelayBody {
    /// Pull the next chunk. `None` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, FetchError>> {
        match self {
            RelayBody::Empty => None,
            RelayBody::Full(data) => data.take().map(Ok),
            RelayBody::Stream(stream) => stream.next().await,
        }
    }
}

impl std::fmt::Debug for RelayBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayBody::Empty => f.write_str("RelayBody::Empty"),
            RelayBody::Full(data) => f
                .debug_tuple("RelayBody::Full")
                .field(&data.as_ref().map(Bytes::len))
                .finish(),
            RelayBody::Stream(_) => f.write_str("RelayBody::Stream"),
        }
    }
}

impl Body for RelayBody {
    type Data = Bytes;
    type Error = FetchError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            RelayBody::Empty => Poll::Ready(None),
            RelayBody::Full(data) => Poll::Ready(data.take().map(|d| Ok(Frame::data(d)))),
            RelayBody::Stream(stream) => stream
                .poll_next_unpin(cx)
                .map(|chunk| chunk.map(|res| res.map(Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            RelayBody::Empty => true,
            RelayBody::Full(data) => data.is_none(),
            RelayBody::Stream(_) => false,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            RelayBody::Empty | RelayBody::Full(None) => SizeHint::with_exact(0),
            RelayBody::Full(Some(data)) => SizeHint::with_exact(data.len() as u64),
            RelayBody::Stream(_) => SizeHint::default(),
        }
    }
}
