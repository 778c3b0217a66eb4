//! Relay frames and connection adapters.
//!
//! The client side of a relay is an axum `WebSocket`, the backend side a
//! tokio-tungstenite stream. Both are wrapped in a [`FrameSocket`] so the pump
//! only ever sees [`Frame`]s.

use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Bytes;
use axum::extract::ws::Message as AxumMessage;
use futures_util::{Sink, Stream};
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;

use super::RelayError;

/// A single WebSocket message on its hop through the pump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close,
}

impl Frame {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) | Frame::Ping(data) | Frame::Pong(data) => data.len(),
            Frame::Close => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text and binary frames carry application data; the rest are control frames.
    pub fn is_data(&self) -> bool {
        matches!(self, Frame::Text(_) | Frame::Binary(_))
    }
}

/// Conversion between a WebSocket library's message type and [`Frame`].
pub trait WireMessage: Sized {
    /// `None` for messages the relay has no use for (raw frames).
    fn into_frame(self) -> Option<Frame>;

    fn from_frame(frame: Frame) -> Self;
}

impl WireMessage for AxumMessage {
    fn into_frame(self) -> Option<Frame> {
        Some(match self {
            AxumMessage::Text(text) => Frame::Text(text.as_str().to_owned()),
            AxumMessage::Binary(data) => Frame::Binary(data),
            AxumMessage::Ping(data) => Frame::Ping(data),
            AxumMessage::Pong(data) => Frame::Pong(data),
            AxumMessage::Close(_) => Frame::Close,
        })
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => AxumMessage::Text(text.into()),
            Frame::Binary(data) => AxumMessage::Binary(data),
            Frame::Ping(data) => AxumMessage::Ping(data),
            Frame::Pong(data) => AxumMessage::Pong(data),
            Frame::Close => AxumMessage::Close(None),
        }
    }
}

impl WireMessage for TungsteniteMessage {
    fn into_frame(self) -> Option<Frame> {
        match self {
            TungsteniteMessage::Text(text) => Some(Frame::Text(text.as_str().to_owned())),
            TungsteniteMessage::Binary(data) => Some(Frame::Binary(data)),
            TungsteniteMessage::Ping(data) => Some(Frame::Ping(data)),
            TungsteniteMessage::Pong(data) => Some(Frame::Pong(data)),
            TungsteniteMessage::Close(_) => Some(Frame::Close),
            TungsteniteMessage::Frame(_) => None,
        }
    }

    fn from_frame(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => TungsteniteMessage::Text(text.into()),
            Frame::Binary(data) => TungsteniteMessage::Binary(data),
            Frame::Ping(data) => TungsteniteMessage::Ping(data),
            Frame::Pong(data) => TungsteniteMessage::Pong(data),
            Frame::Close => TungsteniteMessage::Close(None),
        }
    }
}

/// Adapts a WebSocket connection of message type `M` into a stream and sink of [`Frame`]s.
pub struct FrameSocket<T, M> {
    inner: T,
    _message: PhantomData<fn() -> M>,
}

impl<T, M> FrameSocket<T, M> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            _message: PhantomData,
        }
    }
}

impl<T, M, E> Stream for FrameSocket<T, M>
where
    T: Stream<Item = Result<M, E>> + Unpin,
    M: WireMessage,
    E: Into<axum::BoxError>,
{
    type Item = Result<Frame, RelayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                None => return Poll::Ready(None),
                Some(Err(e)) => return Poll::Ready(Some(Err(RelayError::transport(e)))),
                Some(Ok(message)) => {
                    if let Some(frame) = message.into_frame() {
                        return Poll::Ready(Some(Ok(frame)));
                    }
                }
            }
        }
    }
}

impl<T, M> Sink<Frame> for FrameSocket<T, M>
where
    T: Sink<M> + Unpin,
    T::Error: Into<axum::BoxError>,
    M: WireMessage,
{
    type Error = RelayError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_ready(cx).map_err(RelayError::transport)
    }

    fn start_send(mut self: Pin<&mut Self>, frame: Frame) -> Result<(), Self::Error> {
        Pin::new(&mut self.inner)
            .start_send(M::from_frame(frame))
            .map_err(RelayError::transport)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_flush(cx).map_err(RelayError::transport)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner).poll_close(cx).map_err(RelayError::transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axum_conversion() {
        let frame = AxumMessage::Text("hello".into()).into_frame().unwrap();
        assert_eq!(frame, Frame::Text("hello".to_string()));
        assert!(frame.is_data());

        match AxumMessage::from_frame(Frame::Binary(Bytes::from_static(b"\x01\x02"))) {
            AxumMessage::Binary(data) => assert_eq!(&data[..], b"\x01\x02"),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(matches!(AxumMessage::from_frame(Frame::Close), AxumMessage::Close(None)));
    }

    #[test]
    fn test_tungstenite_conversion() {
        let frame = TungsteniteMessage::Ping(Bytes::from_static(b"p")).into_frame().unwrap();
        assert_eq!(frame, Frame::Ping(Bytes::from_static(b"p")));
        assert!(!frame.is_data());

        match TungsteniteMessage::from_frame(Frame::Text("hi".to_string())) {
            TungsteniteMessage::Text(text) => assert_eq!(text.as_str(), "hi"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(Frame::Text("abc".to_string()).len(), 3);
        assert_eq!(Frame::Binary(Bytes::from(vec![0u8; 2048])).len(), 2048);
        assert!(Frame::Close.is_empty());
    }
}
