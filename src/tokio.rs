use super::MirroredRing;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, ReadBuf};

// The ring never waits: reads of an empty ring and writes to a full one complete immediately with zero bytes.
impl AsyncRead for MirroredRing {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let available_data = match this.peek() {
            Ok(data) => data,
            Err(err) => return Poll::Ready(Err(err.into())),
        };
        let len_to_copy = available_data.len().min(buf.remaining());
        buf.put_slice(&available_data[..len_to_copy]);
        Poll::Ready(this.consume(len_to_copy).map_err(io::Error::from))
    }
}

impl AsyncBufRead for MirroredRing {
    fn poll_fill_buf(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        Poll::Ready(self.get_mut().peek().map_err(io::Error::from))
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        let _ = MirroredRing::consume(self.get_mut(), amt);
    }
}

impl AsyncWrite for MirroredRing {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        Poll::Ready(MirroredRing::write(self.get_mut(), buf).map_err(io::Error::from))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(self.capacity().map(drop).map_err(io::Error::from))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> { self.poll_flush(cx) }
}
