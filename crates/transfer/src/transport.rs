//! Transport seam between the transfer core and the network.
//!
//! The CLI plugs in [`HttpTransport`](crate::http::HttpTransport); tests
//! plug in mocks. Keeping this a trait keeps the dispatcher testable
//! without sockets.

use std::future::Future;
use std::pin::Pin;

use crate::error::TransportError;
use crate::types::Chunk;

/// Byte-level progress callback: `(bytes_transferred, bytes_total)`.
pub type ByteProgress<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// What the endpoint acknowledged for a delivered chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Size of the request body that was accepted.
    pub bytes_sent: u64,
    /// Acknowledgement text from the endpoint, if any.
    pub message: String,
}

/// Delivers one chunk to the remote endpoint.
pub trait Transport: Send + Sync {
    /// Sends `chunk` and waits for the endpoint's verdict.
    ///
    /// Implementations may call `progress` any number of times before
    /// returning. Every failure must come back classified as a
    /// [`TransportError`].
    fn transmit<'a>(
        &'a self,
        chunk: &'a Chunk,
        progress: ByteProgress<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<Delivery, TransportError>> + Send + 'a>>;
}
