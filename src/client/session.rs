// ABOUTME: SMPP session state machine over a Connection: bind, submit, unbind and disconnect
// ABOUTME: Tracks in-flight submit_sm sequence numbers; forwards acks and receipts to SessionEvents

use crate::client::error::{SmppError, SmppResult};
use crate::client::keepalive::KeepAliveConfig;
use crate::client::types::{BindCredentials, SessionState, SubmitOptions};
use crate::codec::{CodecError, Pdu};
use crate::connection::{Connection, PduHandler};
use crate::datatypes::{
    Bind, CommandStatus, DeliverSm, DeliveryReceipt, EsmClass, MessageBody, SubmitSm, Unbind,
};
use crate::message::OutboundMessage;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where and how a session connects
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub credentials: BindCredentials,
    pub submit: SubmitOptions,
    pub connect_timeout: Duration,
    /// Deadline for bind_resp and unbind_resp
    pub response_timeout: Duration,
    pub keep_alive: KeepAliveConfig,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, credentials: BindCredentials) -> Self {
        Self {
            host: host.into(),
            port,
            credentials,
            submit: SubmitOptions::default(),
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(10),
            keep_alive: KeepAliveConfig::default(),
        }
    }
}

/// One submit_sm on the wire whose submit_sm_resp has not arrived yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSubmission {
    pub sequence_number: u32,
    pub destination: String,
    /// 0-based position within the message
    pub segment_index: usize,
    pub submitted_at: Instant,
    pub waiter_id: u64,
}

/// Callbacks from the receive loop. Implemented once per session by whatever
/// correlates acknowledgements with callers.
pub trait SessionEvents: Send + Sync + 'static {
    /// Positive submit_sm_resp for a segment
    fn on_submit_resp(
        &self,
        submission: PendingSubmission,
        message_id: String,
    ) -> impl Future<Output = ()> + Send;

    /// Negative submit_sm_resp, or a generic_nack answering the submit_sm
    fn on_submit_failed(
        &self,
        submission: PendingSubmission,
        error: SmppError,
    ) -> impl Future<Output = ()> + Send;

    fn on_delivery_receipt(&self, receipt: DeliveryReceipt) -> impl Future<Output = ()> + Send;

    /// The transport is gone or the session was disconnected; every pending
    /// submission has already been discarded.
    fn on_session_lost(&self, reason: String) -> impl Future<Output = ()> + Send;
}

struct StateCell {
    state: SessionState,
    // Identifies the connection the state belongs to
    generation: u64,
}

struct Inner<E> {
    config: SessionConfig,
    state: StdMutex<StateCell>,
    submissions: StdMutex<HashMap<u32, PendingSubmission>>,
    generations: AtomicU64,
    events: Arc<E>,
}

impl<E: SessionEvents> Inner<E> {
    fn cell(&self) -> MutexGuard<'_, StateCell> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> SessionState {
        self.cell().state
    }

    /// Move to `to` only while the current state satisfies `from`
    fn transition(&self, from: impl Fn(SessionState) -> bool, to: SessionState) -> bool {
        let mut cell = self.cell();
        if !from(cell.state) {
            return false;
        }
        debug!(from = %cell.state, to = %to, "Session state change");
        cell.state = to;
        true
    }

    fn submissions(&self) -> MutexGuard<'_, HashMap<u32, PendingSubmission>> {
        self.submissions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_submission(&self, sequence_number: u32) -> Option<PendingSubmission> {
        self.submissions().remove(&sequence_number)
    }

    fn drain_submissions(&self) -> usize {
        let mut submissions = self.submissions();
        let count = submissions.len();
        submissions.clear();
        count
    }
}

/// An SMPP session with one SMSC.
///
/// State only changes through the methods here or through the receive-loop
/// callbacks the session installs on its Connection.
pub struct Session<E> {
    inner: Arc<Inner<E>>,
    // Held across connect/bind/submit/unbind so those never interleave
    link: Mutex<Option<Connection>>,
}

impl<E: SessionEvents> Session<E> {
    pub fn new(config: SessionConfig, events: Arc<E>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: StdMutex::new(StateCell {
                    state: SessionState::Closed,
                    generation: 0,
                }),
                submissions: StdMutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
                events,
            }),
            link: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn submit_options(&self) -> &SubmitOptions {
        &self.inner.config.submit
    }

    /// Submissions still waiting for their submit_sm_resp
    pub fn outstanding_submissions(&self) -> usize {
        self.inner.submissions().len()
    }

    /// Open the transport. A no-op unless the session is Closed.
    pub async fn connect(&self) -> SmppResult<()> {
        let mut link = self.link.lock().await;
        if self.state() != SessionState::Closed {
            return Ok(());
        }

        let config = &self.inner.config;
        let generation = self.inner.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let handler = Arc::new(SessionHandler {
            inner: self.inner.clone(),
            generation,
        });
        let connection = Connection::connect(
            &config.host,
            config.port,
            config.connect_timeout,
            handler,
            config.keep_alive.clone(),
        )
        .await?;

        {
            let mut cell = self.inner.cell();
            // The loop closes before it reports loss, so this check cannot miss one
            if connection.is_closed() {
                return Err(SmppError::ConnectionLost(
                    "connection closed during connect".into(),
                ));
            }
            cell.state = SessionState::Open;
            cell.generation = generation;
        }
        *link = Some(connection);

        info!(host = %config.host, port = config.port, "Connected to SMSC");
        Ok(())
    }

    /// Bind with the configured credentials. Requires Open; a no-op when
    /// already bound.
    pub async fn bind(&self) -> SmppResult<()> {
        let link = self.link.lock().await;
        let state = self.state();
        if state.is_bound() {
            return Ok(());
        }
        let connection = match (state, link.as_ref()) {
            (SessionState::Open, Some(connection)) => connection,
            _ => return Err(wrong_state("bind", state)),
        };

        let credentials = &self.inner.config.credentials;
        let mut bind = Bind::new(
            connection.next_sequence(),
            credentials.bind_type,
            &credentials.system_id,
            &credentials.password,
        )
        .with_interface_version(credentials.interface_version);
        if let Some(system_type) = &credentials.system_type {
            bind = bind.with_system_type(system_type);
        }

        let response = connection
            .request(Pdu::Bind(bind), self.inner.config.response_timeout)
            .await?;
        match response {
            Pdu::BindResp(resp) if resp.command_status.is_ok() => {
                let bound = SessionState::bound(credentials.bind_type);
                if !self
                    .inner
                    .transition(|state| state == SessionState::Open, bound)
                {
                    return Err(SmppError::ConnectionLost(
                        "session closed during bind".into(),
                    ));
                }
                info!(
                    system_id = %credentials.system_id,
                    smsc_system_id = %resp.system_id,
                    state = %bound,
                    "Bound to SMSC"
                );
                Ok(())
            }
            Pdu::BindResp(resp) => {
                warn!(status = %resp.command_status, "Bind rejected");
                Err(SmppError::Protocol(resp.command_status))
            }
            Pdu::GenericNack(nack) => {
                warn!(status = %nack.command_status, "Bind answered with generic_nack");
                Err(SmppError::Protocol(nack.command_status))
            }
            other => Err(SmppError::MalformedPdu(CodecError::UnexpectedCommandId {
                expected: credentials.bind_type.response_id(),
                actual: other.command_id(),
            })),
        }
    }

    /// Write every segment of `message` as its own submit_sm in one batch.
    ///
    /// Returns the sequence numbers used, in segment order, once the bytes are
    /// written; acknowledgements arrive later through [`SessionEvents`].
    pub async fn submit(&self, message: &OutboundMessage, waiter_id: u64) -> SmppResult<Vec<u32>> {
        let link = self.link.lock().await;
        let state = self.state();
        let connection = match link.as_ref() {
            Some(connection) if state.can_submit() => connection,
            _ => return Err(wrong_state("submit", state)),
        };
        if message.segments.is_empty() {
            return Err(SmppError::InvalidData("message has no segments".into()));
        }

        let registered_delivery = self.inner.config.submit.registered_delivery;
        let submitted_at = Instant::now();
        let mut pdus = Vec::with_capacity(message.segments.len());
        let mut submissions = Vec::with_capacity(message.segments.len());

        for (segment_index, segment) in message.segments.iter().enumerate() {
            let sequence_number = connection.next_sequence();
            let esm_class = match segment.header {
                Some(_) => EsmClass::default().with_udhi(),
                None => EsmClass::default(),
            };
            let body = MessageBody {
                source: message.source.clone(),
                destination: message.destination.clone(),
                esm_class,
                registered_delivery,
                data_coding: segment.data_coding,
                short_message: segment.payload.clone(),
                ..Default::default()
            };
            pdus.push(Pdu::SubmitSm(Box::new(SubmitSm::new(sequence_number, body))));
            submissions.push(PendingSubmission {
                sequence_number,
                destination: message.destination.addr.clone(),
                segment_index,
                submitted_at,
                waiter_id,
            });
        }

        let sequence_numbers: Vec<u32> = submissions.iter().map(|s| s.sequence_number).collect();
        {
            // Registered before the write so a fast submit_sm_resp always finds its entry
            let mut pending = self.inner.submissions();
            for submission in submissions {
                pending.insert(submission.sequence_number, submission);
            }
        }

        if let Err(e) = connection.send_pdus(&pdus).await {
            let mut pending = self.inner.submissions();
            for sequence_number in &sequence_numbers {
                pending.remove(sequence_number);
            }
            return Err(e);
        }

        debug!(
            destination = %message.destination,
            segments = sequence_numbers.len(),
            waiter_id,
            "Submitted message"
        );
        Ok(sequence_numbers)
    }

    /// Send unbind and wait for unbind_resp. Requires a bound session.
    pub async fn unbind(&self) -> SmppResult<()> {
        let link = self.link.lock().await;
        let state = self.state();
        match link.as_ref() {
            Some(connection) if state.is_bound() => self.unbind_on(connection).await,
            _ => Err(wrong_state("unbind", state)),
        }
    }

    async fn unbind_on(&self, connection: &Connection) -> SmppResult<()> {
        let unbind = Unbind::new(connection.next_sequence());
        let response = connection
            .request(Pdu::Unbind(unbind), self.inner.config.response_timeout)
            .await?;

        self.inner
            .transition(|state| state.is_bound(), SessionState::Open);
        match response {
            Pdu::UnbindResp(resp) if resp.command_status.is_ok() => {
                info!("Unbound from SMSC");
                Ok(())
            }
            other => Err(SmppError::Protocol(other.command_status())),
        }
    }

    /// Tear the session down: fail outstanding waiters, unbind if bound,
    /// close the transport. Always ends Closed.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;

        let dropped = self.inner.drain_submissions();
        if dropped > 0 {
            debug!(dropped, "Discarding pending submissions");
        }
        self.inner
            .events
            .on_session_lost("session disconnected".to_string())
            .await;

        if let Some(connection) = link.take() {
            if self.state().is_bound() {
                if let Err(e) = self.unbind_on(&connection).await {
                    warn!(error = %e, "Unbind during disconnect failed");
                }
            }
            connection.close().await;
        }

        self.inner.transition(|_| true, SessionState::Closed);
        info!("Disconnected from SMSC");
    }
}

fn wrong_state(operation: &'static str, state: SessionState) -> SmppError {
    SmppError::WrongState {
        operation,
        state: state.to_string(),
    }
}

/// Receive-loop callbacks for one connection of a session
struct SessionHandler<E> {
    inner: Arc<Inner<E>>,
    generation: u64,
}

impl<E: SessionEvents> SessionHandler<E> {
    async fn submit_answered(
        &self,
        sequence_number: u32,
        status: CommandStatus,
        message_id: String,
    ) {
        let Some(submission) = self.inner.take_submission(sequence_number) else {
            debug!(sequence_number, "Response for unknown submission");
            return;
        };

        if status.is_ok() {
            debug!(
                sequence_number,
                message_id = %message_id,
                destination = %submission.destination,
                "Segment accepted"
            );
            self.inner.events.on_submit_resp(submission, message_id).await;
        } else {
            warn!(
                sequence_number,
                status = %status,
                destination = %submission.destination,
                "Segment rejected"
            );
            self.inner
                .events
                .on_submit_failed(submission, SmppError::Protocol(status))
                .await;
        }
    }
}

impl<E: SessionEvents> PduHandler for SessionHandler<E> {
    async fn on_deliver_sm(&self, deliver: DeliverSm) -> CommandStatus {
        match DeliveryReceipt::from_deliver_sm(&deliver) {
            Some(receipt) => {
                debug!(
                    recipient = %receipt.recipient,
                    message_id = ?receipt.message_id,
                    state = ?receipt.state,
                    "Delivery receipt"
                );
                self.inner.events.on_delivery_receipt(receipt).await;
            }
            None => {
                info!(source = %deliver.source, "Ignoring mobile originated message");
            }
        }
        CommandStatus::OK
    }

    async fn on_response(&self, pdu: Pdu) {
        match pdu {
            Pdu::SubmitSmResp(resp) => {
                self.submit_answered(resp.sequence_number, resp.command_status, resp.message_id)
                    .await
            }
            Pdu::GenericNack(nack) => {
                let status = if nack.command_status.is_ok() {
                    CommandStatus::SYSTEM_ERROR
                } else {
                    nack.command_status
                };
                self.submit_answered(nack.sequence_number, status, String::new())
                    .await
            }
            other => {
                debug!(
                    command_id = ?other.command_id(),
                    sequence_number = other.sequence_number(),
                    "Unsolicited response"
                );
            }
        }
    }

    async fn on_unbind(&self) {
        if self
            .inner
            .transition(|state| state.is_bound(), SessionState::Open)
        {
            info!("SMSC ended the bind");
        }
    }

    async fn on_connection_lost(&self, reason: String) {
        {
            let mut cell = self.inner.cell();
            if cell.generation != self.generation || cell.state == SessionState::Closed {
                return;
            }
            cell.state = SessionState::Closed;
        }
        let dropped = self.inner.drain_submissions();
        warn!(reason = %reason, dropped, "Session lost");
        self.inner.events.on_session_lost(reason).await;
    }
}
