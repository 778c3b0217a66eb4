//! Bidirectional frame pump between two WebSocket connections.
//!
//! # Responsibilities
//! - Read frames from each side and queue them toward the other side
//! - Serialize every write to both connections through one writer task
//! - Ping both sides every `ping_period`; drop a side silent for `pong_wait`
//! - Close both connections exactly once, whichever side fails first
//!
//! # Design Decisions
//! - Queues are bounded; a slow destination backpressures its source reader
//! - A reader ending drops its queue sender, which the writer sees as "closed"
//! - The writer's exit signals both readers to stop, so no task outlives the pump

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{Frame, RelayError, RelayGuard, RelayId, RelayOptions, Side};
use crate::observability::metrics;

/// Frames buffered per direction before the source reader waits.
const QUEUE_CAPACITY: usize = 32;

/// A full-duplex frame connection the pump can drive.
pub trait FrameConnection:
    Stream<Item = Result<Frame, RelayError>> + Sink<Frame, Error = RelayError> + Send + Unpin + 'static
{
}

impl<T> FrameConnection for T where
    T: Stream<Item = Result<Frame, RelayError>>
        + Sink<Frame, Error = RelayError>
        + Send
        + Unpin
        + 'static
{
}

/// Why a pump's writer stopped.
#[derive(Debug)]
pub enum PumpExit {
    /// The client side stopped producing frames.
    ExternalClosed,
    /// The backend side stopped producing frames.
    InternalClosed,
    /// A write or ping failed.
    Failed(RelayError),
}

/// Handles to the three tasks of a running pump.
#[derive(Debug)]
pub struct PumpTasks {
    pub relay_id: RelayId,
    pub external_reader: JoinHandle<Result<(), RelayError>>,
    pub internal_reader: JoinHandle<Result<(), RelayError>>,
    pub writer: JoinHandle<PumpExit>,
}

impl PumpTasks {
    pub fn is_finished(&self) -> bool {
        self.external_reader.is_finished()
            && self.internal_reader.is_finished()
            && self.writer.is_finished()
    }

    /// Wait for all three tasks and report why the writer stopped.
    pub async fn join(self) -> PumpExit {
        let _ = self.external_reader.await;
        let _ = self.internal_reader.await;
        self.writer
            .await
            .unwrap_or_else(|e| PumpExit::Failed(RelayError::transport(e)))
    }
}

/// Relay between a client-facing (`external`) and a backend (`internal`) connection.
pub struct Pump<E, I> {
    external: E,
    internal: I,
    options: RelayOptions,
}

impl<E, I> Pump<E, I>
where
    E: FrameConnection,
    I: FrameConnection,
{
    pub fn new(external: E, internal: I, options: RelayOptions) -> Self {
        Self {
            external,
            internal,
            options,
        }
    }

    /// Spawn the external reader, internal reader and writer, then return.
    ///
    /// The guard is held until all three tasks have exited.
    pub fn start(self, guard: RelayGuard) -> PumpTasks {
        let relay_id = guard.id();
        let guard = Arc::new(guard);
        let options = self.options;

        let (external_sink, external_stream) = self.external.split();
        let (internal_sink, internal_stream) = self.internal.split();
        let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);

        tracing::debug!(
            relay_id = %relay_id,
            ping_period = ?options.ping_period,
            pong_wait = ?options.pong_wait,
            "Relay pump starting"
        );

        let external_reader = tokio::spawn(
            Reader {
                side: Side::External,
                stream: external_stream,
                queue: inbound_tx,
                stop: stop_rx.clone(),
                options,
                guard: Arc::clone(&guard),
            }
            .run(),
        );

        let internal_reader = tokio::spawn(
            Reader {
                side: Side::Internal,
                stream: internal_stream,
                queue: outbound_tx,
                stop: stop_rx,
                options,
                guard: Arc::clone(&guard),
            }
            .run(),
        );

        let writer = tokio::spawn(
            Writer {
                external: external_sink,
                internal: internal_sink,
                inbound: inbound_rx,
                outbound: outbound_rx,
                stop: stop_tx,
                options,
                guard,
            }
            .run(),
        );

        PumpTasks {
            relay_id,
            external_reader,
            internal_reader,
            writer,
        }
    }
}

/// Reads one side and forwards its data frames toward the other side.
struct Reader<S> {
    side: Side,
    stream: SplitStream<S>,
    queue: mpsc::Sender<Frame>,
    stop: watch::Receiver<bool>,
    options: RelayOptions,
    guard: Arc<RelayGuard>,
}

impl<S: FrameConnection> Reader<S> {
    async fn run(mut self) -> Result<(), RelayError> {
        let result = self.read_frames().await;
        match &result {
            Ok(()) => tracing::debug!(relay_id = %self.guard.id(), side = %self.side, "Relay reader finished"),
            Err(e) => tracing::debug!(relay_id = %self.guard.id(), side = %self.side, error = %e, "Relay reader failed"),
        }
        result
    }

    async fn read_frames(&mut self) -> Result<(), RelayError> {
        let mut deadline = Instant::now() + self.options.pong_wait;

        loop {
            let next = tokio::select! {
                _ = self.stop.changed() => return Ok(()),
                next = time::timeout_at(deadline, self.stream.next()) => next,
            };

            let frame = match next {
                Err(_) => return Err(RelayError::ReadTimeout(self.side)),
                Ok(None) => return Ok(()),
                Ok(Some(frame)) => frame?,
            };

            match frame {
                Frame::Pong(_) => deadline = Instant::now() + self.options.pong_wait,
                // Answered by the protocol layer.
                Frame::Ping(_) => {}
                Frame::Close => return Ok(()),
                frame => {
                    if frame.len() > self.options.max_message_size {
                        return Err(RelayError::MessageTooLarge {
                            side: self.side,
                            size: frame.len(),
                            limit: self.options.max_message_size,
                        });
                    }
                    if self.queue.send(frame).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Sole writer for both connections.
struct Writer<E: FrameConnection, I: FrameConnection> {
    external: SplitSink<E, Frame>,
    internal: SplitSink<I, Frame>,
    inbound: mpsc::Receiver<Frame>,
    outbound: mpsc::Receiver<Frame>,
    stop: watch::Sender<bool>,
    options: RelayOptions,
    guard: Arc<RelayGuard>,
}

impl<E: FrameConnection, I: FrameConnection> Writer<E, I> {
    async fn run(self) -> PumpExit {
        let Writer {
            mut external,
            mut internal,
            mut inbound,
            mut outbound,
            stop,
            options,
            guard,
        } = self;
        let wait = options.write_wait;

        let first_ping = Instant::now() + options.ping_period;
        let mut external_ping = time::interval_at(first_ping, options.ping_period);
        let mut internal_ping = time::interval_at(first_ping, options.ping_period);
        external_ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        internal_ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            let result = tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(frame) => send_within(&mut external, frame, wait, Side::External)
                        .await
                        .map(|()| metrics::record_frame("outbound")),
                    None => {
                        let _ = send_within(&mut external, Frame::Close, wait, Side::External).await;
                        break PumpExit::InternalClosed;
                    }
                },
                frame = inbound.recv() => match frame {
                    Some(frame) => send_within(&mut internal, frame, wait, Side::Internal)
                        .await
                        .map(|()| metrics::record_frame("inbound")),
                    None => {
                        let _ = send_within(&mut internal, Frame::Close, wait, Side::Internal).await;
                        break PumpExit::ExternalClosed;
                    }
                },
                _ = external_ping.tick() => {
                    send_within(&mut external, Frame::Ping(Default::default()), wait, Side::External).await
                }
                _ = internal_ping.tick() => {
                    send_within(&mut internal, Frame::Ping(Default::default()), wait, Side::Internal).await
                }
            };

            if let Err(e) = result {
                break PumpExit::Failed(e);
            }
        };

        // Tickers stop with this scope; release the readers, then both sockets.
        let _ = stop.send(true);
        drop(inbound);
        drop(outbound);
        let _ = time::timeout(wait, external.close()).await;
        let _ = time::timeout(wait, internal.close()).await;

        match &exit {
            PumpExit::Failed(e) => {
                tracing::info!(relay_id = %guard.id(), error = %e, "Relay closed after failure")
            }
            reason => tracing::info!(relay_id = %guard.id(), reason = ?reason, "Relay closed"),
        }
        exit
    }
}

async fn send_within<S>(
    sink: &mut S,
    frame: Frame,
    wait: Duration,
    side: Side,
) -> Result<(), RelayError>
where
    S: Sink<Frame, Error = RelayError> + Unpin,
{
    match time::timeout(wait, sink.send(frame)).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::WriteTimeout(side)),
    }
}
