// ABOUTME: Owns the byte stream to the SMSC: frames PDUs, runs the receive loop, pairs responses
// ABOUTME: Answers enquire_link, deliver_sm and unbind itself and nacks anything it cannot decode

use crate::client::error::{SmppError, SmppResult};
use crate::client::keepalive::{KeepAliveConfig, KeepAliveManager};
use crate::codec::{CodecError, MAX_PDU_SIZE, Pdu, PduHeader};
use crate::datatypes::{
    CommandStatus, DeliverSm, DeliverSmResponse, EnquireLink, EnquireLinkResponse, GenericNack,
    UnbindResponse,
};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Highest sequence number handed out before wrapping back to 1
pub const MAX_SEQUENCE_NUMBER: u32 = 0x7FFF_FFFF;

/// Callbacks for PDUs the receive loop does not settle on its own.
///
/// All methods run on the receive-loop task, so they should finish quickly;
/// a slow `on_deliver_sm` delays every PDU behind it.
pub trait PduHandler: Send + Sync + 'static {
    /// Handle an inbound deliver_sm. The returned status is sent back in the
    /// deliver_sm_resp.
    fn on_deliver_sm(&self, deliver: DeliverSm) -> impl Future<Output = CommandStatus> + Send;

    /// A response whose sequence number nobody is waiting on through
    /// [`Connection::request`]
    fn on_response(&self, pdu: Pdu) -> impl Future<Output = ()> + Send;

    /// The SMSC ended the session; unbind_resp has already been sent
    fn on_unbind(&self) -> impl Future<Output = ()> + Send;

    /// The link is gone. Called at most once per connection and never after
    /// [`Connection::close`].
    fn on_connection_lost(&self, reason: String) -> impl Future<Output = ()> + Send;
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Requests awaiting a response, keyed by sequence number
#[derive(Default)]
struct Pending {
    waiters: HashMap<u32, oneshot::Sender<Pdu>>,
    closed: bool,
}

/// State shared by the `Connection` handle and its receive loop
struct Shared {
    // Writes are serialized here. `None` once the writer has been shut down.
    writer: Mutex<Option<BufWriter<BoxedWriter>>>,
    last_write: StdMutex<Instant>,
    pending: StdMutex<Pending>,
    sequence: AtomicU32,
    shutdown: Notify,
}

impl Shared {
    fn next_sequence(&self) -> u32 {
        self.sequence
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(if current >= MAX_SEQUENCE_NUMBER {
                    1
                } else {
                    current + 1
                })
            })
            .unwrap_or(1)
    }

    fn last_write(&self) -> Instant {
        self.last_write
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn touch(&self) {
        if let Ok(mut guard) = self.last_write.lock() {
            *guard = Instant::now();
        }
    }

    fn register(&self, sequence_number: u32) -> SmppResult<oneshot::Receiver<Pdu>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| SmppError::ConnectionLost("pending table poisoned".into()))?;
        if pending.closed {
            return Err(SmppError::ConnectionLost("connection closed".into()));
        }
        let (tx, rx) = oneshot::channel();
        pending.waiters.insert(sequence_number, tx);
        Ok(rx)
    }

    fn take_waiter(&self, sequence_number: u32) -> Option<oneshot::Sender<Pdu>> {
        self.pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.waiters.remove(&sequence_number))
    }

    /// Drop every waiter; their receivers observe the closed channel
    fn fail_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.closed = true;
            if !pending.waiters.is_empty() {
                debug!(count = pending.waiters.len(), "Failing outstanding requests");
            }
            pending.waiters.clear();
        }
    }

    fn is_closed(&self) -> bool {
        self.pending.lock().map(|p| p.closed).unwrap_or(true)
    }

    /// Write already-encoded frames under one lock and flush once.
    async fn write_frames(&self, frames: &[Bytes]) -> SmppResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| SmppError::ConnectionLost("connection closed".into()))?;

        for frame in frames {
            writer.write_all(frame).await?;
        }
        writer.flush().await?;
        drop(guard);

        self.touch();
        Ok(())
    }

    async fn send(&self, pdus: &[Pdu]) -> SmppResult<()> {
        let frames = pdus
            .iter()
            .map(|pdu| pdu.to_bytes())
            .collect::<Result<Vec<_>, CodecError>>()?;

        for pdu in pdus {
            trace!(
                command_id = ?pdu.command_id(),
                sequence_number = pdu.sequence_number(),
                "Sending PDU"
            );
        }
        self.write_frames(&frames).await
    }
}

/// An SMPP transport session over any byte stream.
///
/// The stream is split: the write half sits behind a mutex shared by every
/// sender, the read half belongs to a background task that decodes one PDU
/// per frame and routes it. Responses go to the `oneshot` registered by
/// [`request`](Self::request) for their sequence number, everything else goes
/// to the [`PduHandler`].
///
/// The Connection knows nothing about bind state; the session on top of it
/// decides which PDUs may be sent when.
pub struct Connection {
    shared: Arc<Shared>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}

impl Connection {
    /// Open a TCP connection to `host:port` and start the receive loop.
    pub async fn connect<H: PduHandler>(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        handler: Arc<H>,
        keep_alive: KeepAliveConfig,
    ) -> SmppResult<Connection> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {}:{} timed out", host, port),
                )
            })??;
        stream.set_nodelay(true)?;
        debug!(host, port, "TCP connection established");

        Ok(Self::spawn(stream, handler, keep_alive))
    }

    /// Run the protocol over an already-open stream.
    pub fn spawn<S, H>(stream: S, handler: Arc<H>, keep_alive: KeepAliveConfig) -> Connection
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        H: PduHandler,
    {
        let (reader, writer) = tokio::io::split(stream);
        let writer: BoxedWriter = Box::new(writer);

        let shared = Arc::new(Shared {
            writer: Mutex::new(Some(BufWriter::new(writer))),
            last_write: StdMutex::new(Instant::now()),
            pending: StdMutex::new(Pending::default()),
            sequence: AtomicU32::new(1),
            shutdown: Notify::new(),
        });

        let receive_loop = ReceiveLoop {
            reader: FrameReader::new(reader),
            shared: shared.clone(),
            handler,
            keep_alive: KeepAliveManager::new(keep_alive),
        };
        let task = tokio::spawn(receive_loop.run());

        Connection {
            shared,
            task: StdMutex::new(Some(task)),
        }
    }

    /// Next sequence number, 1..=0x7FFFFFFF, wrapping
    pub fn next_sequence(&self) -> u32 {
        self.shared.next_sequence()
    }

    /// Encode and write one PDU. Writes are never interleaved.
    pub async fn send_pdu(&self, pdu: &Pdu) -> SmppResult<()> {
        self.shared.send(std::slice::from_ref(pdu)).await
    }

    /// Write several PDUs back to back under one writer lock. Nothing is
    /// written if any of them fails to encode.
    pub async fn send_pdus(&self, pdus: &[Pdu]) -> SmppResult<()> {
        self.shared.send(pdus).await
    }

    /// Send a request and wait for the response carrying its sequence number.
    ///
    /// Whatever PDU answers comes back as-is, a generic_nack included; the
    /// caller decides what a negative status means.
    pub async fn request(&self, pdu: Pdu, timeout: Duration) -> SmppResult<Pdu> {
        let sequence_number = pdu.sequence_number();
        let rx = self.shared.register(sequence_number)?;

        if let Err(e) = self.send_pdu(&pdu).await {
            self.shared.take_waiter(sequence_number);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SmppError::ConnectionLost(
                "connection closed before response".into(),
            )),
            Err(_) => {
                self.shared.take_waiter(sequence_number);
                debug!(sequence_number, "Request timed out");
                Err(SmppError::Timeout)
            }
        }
    }

    /// True once the receive loop has ended
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Stop the receive loop and shut the writer down. Outstanding requests
    /// fail with `ConnectionLost`; the handler is not told.
    pub async fn close(&self) {
        self.shared.shutdown.notify_one();

        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            let _ = task.await;
        }
        self.shared.fail_pending();

        let mut writer = self.shared.writer.lock().await;
        if let Some(mut writer) = writer.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Error shutting down writer");
            }
        }
        debug!("Connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // A loop that already ended ignores the stored permit
        self.shared.shutdown.notify_one();
    }
}

/// A frame pulled off the wire
#[derive(Debug)]
enum Frame {
    Pdu(Pdu),
    /// Framed correctly but not decodable; answered with generic_nack
    Rejected {
        sequence_number: u32,
        error: CodecError,
    },
}

/// Buffered reader splitting the inbound stream at command_length boundaries
struct FrameReader<R> {
    stream: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    fn new(stream: R) -> Self {
        Self {
            stream,
            // 4KB holds any receipt or response comfortably
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read the next frame. `Ok(None)` is a clean EOF between frames.
    ///
    /// Cancel safe: bytes already read stay in the buffer.
    async fn read_frame(&mut self) -> SmppResult<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                // EOF mid-frame means the peer went away while sending
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(SmppError::ConnectionLost("connection reset by peer".into()))
                };
            }
        }
    }

    fn parse_frame(&mut self) -> SmppResult<Option<Frame>> {
        if self.buffer.len() < 4 {
            return Ok(None);
        }
        let length = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);

        // No way to resynchronise after a length like this
        if length > MAX_PDU_SIZE {
            return Err(SmppError::MalformedPdu(CodecError::InvalidPduLength {
                length,
                min: PduHeader::SIZE as u32,
                max: MAX_PDU_SIZE,
            }));
        }

        if (length as usize) < PduHeader::SIZE {
            let consumed = (length as usize).max(4);
            if self.buffer.len() < consumed {
                return Ok(None);
            }
            let frame = self.buffer.split_to(consumed);
            return Ok(Some(Frame::Rejected {
                sequence_number: PduHeader::peek_sequence_number(&frame),
                error: CodecError::InvalidPduLength {
                    length,
                    min: PduHeader::SIZE as u32,
                    max: MAX_PDU_SIZE,
                },
            }));
        }

        if self.buffer.len() < length as usize {
            self.buffer.reserve(length as usize - self.buffer.len());
            return Ok(None);
        }

        let frame = self.buffer.split_to(length as usize).freeze();
        Ok(Some(match Pdu::decode(&frame) {
            Ok(pdu) => Frame::Pdu(pdu),
            Err(error) => Frame::Rejected {
                sequence_number: PduHeader::peek_sequence_number(&frame),
                error,
            },
        }))
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

struct ReceiveLoop<R, H> {
    reader: FrameReader<ReadHalf<R>>,
    shared: Arc<Shared>,
    handler: Arc<H>,
    keep_alive: KeepAliveManager,
}

impl<R, H> ReceiveLoop<R, H>
where
    R: AsyncRead + AsyncWrite + Send + 'static,
    H: PduHandler,
{
    async fn run(mut self) {
        let reason = loop {
            let deadline = self.keep_alive.next_deadline(self.shared.last_write());
            let tick = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = self.shared.shutdown.notified() => {
                    self.shared.fail_pending();
                    debug!("Receive loop stopped");
                    return;
                }
                frame = self.reader.read_frame() => match frame {
                    Ok(Some(frame)) => {
                        self.keep_alive.reset_failures();
                        if let Err(e) = self.dispatch(frame).await {
                            break e.to_string();
                        }
                    }
                    Ok(None) => break "connection closed by peer".to_string(),
                    Err(e) => {
                        if let SmppError::MalformedPdu(ref codec) = e {
                            let nack = GenericNack::new(codec.to_command_status(), 0);
                            let _ = self.shared.send(&[Pdu::GenericNack(nack)]).await;
                        }
                        break e.to_string();
                    }
                },
                _ = tick => {
                    if let Err(reason) = self.keep_alive_tick().await {
                        break reason;
                    }
                }
            }
        };

        warn!(reason = %reason, "Connection lost");
        self.shared.fail_pending();
        self.handler.on_connection_lost(reason).await;
    }

    async fn keep_alive_tick(&mut self) -> Result<(), String> {
        let now = Instant::now();
        self.keep_alive.check_timeout(now);
        if self.keep_alive.is_connection_failed() {
            return Err("keep-alive failed: enquire_link unanswered".to_string());
        }

        if self.keep_alive.should_ping(now, self.shared.last_write()) {
            let sequence_number = self.shared.next_sequence();
            self.shared
                .send(&[Pdu::EnquireLink(EnquireLink::new(sequence_number))])
                .await
                .map_err(|e| e.to_string())?;
            self.keep_alive.on_ping_sent(sequence_number, Instant::now());
        }
        Ok(())
    }

    async fn dispatch(&mut self, frame: Frame) -> SmppResult<()> {
        let pdu = match frame {
            Frame::Pdu(pdu) => pdu,
            Frame::Rejected {
                sequence_number,
                error,
            } => {
                warn!(sequence_number, error = %error, "Rejecting undecodable PDU");
                let nack = GenericNack::new(error.to_command_status(), sequence_number);
                return self.shared.send(&[Pdu::GenericNack(nack)]).await;
            }
        };

        let sequence_number = pdu.sequence_number();
        trace!(command_id = ?pdu.command_id(), sequence_number, "Received PDU");

        match pdu {
            Pdu::EnquireLink(_) => {
                let resp = EnquireLinkResponse::new(sequence_number);
                self.shared.send(&[Pdu::EnquireLinkResp(resp)]).await
            }
            Pdu::EnquireLinkResp(_) if self.keep_alive.on_pong(sequence_number) => Ok(()),
            Pdu::DeliverSm(deliver) => {
                let status = self.handler.on_deliver_sm(*deliver).await;
                let resp = DeliverSmResponse::new(sequence_number, status);
                self.shared.send(&[Pdu::DeliverSmResp(resp)]).await
            }
            Pdu::Unbind(_) => {
                debug!(sequence_number, "SMSC requested unbind");
                let resp = UnbindResponse::new(sequence_number);
                self.shared.send(&[Pdu::UnbindResp(resp)]).await?;
                self.handler.on_unbind().await;
                Ok(())
            }
            pdu if pdu.is_response() => {
                match self.shared.take_waiter(sequence_number) {
                    Some(waiter) => {
                        // The requester may have given up already
                        let _ = waiter.send(pdu);
                    }
                    None => self.handler.on_response(pdu).await,
                }
                Ok(())
            }
            other => {
                // A request an ESME never accepts, such as submit_sm or bind
                warn!(command_id = ?other.command_id(), sequence_number, "Unsupported request");
                let nack = GenericNack::invalid_command_id(sequence_number);
                self.shared.send(&[Pdu::GenericNack(nack)]).await
            }
        }
    }
}
