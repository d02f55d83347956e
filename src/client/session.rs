//! RTMP publishing session
//!
//! Drives a single publish from TCP connect through handshake, the command
//! sequence (`connect`, `releaseStream`, `FCPublish`, `createStream`,
//! `publish`), into steady-state streaming with keepalive pings and
//! window-acknowledgement flow control.
//!
//! Task model: the session task is the sole writer on the socket. A reader
//! task decodes inbound chunks (applying `Set Chunk Size` and `Abort`
//! locally) and posts whole messages on a bounded channel; it never writes.
//! Producers deposit media onto the bounded queues behind [`MediaHandle`];
//! the session task drains them. The outer device state machine observes the
//! session through a watch channel plus a pull-based event stream, never
//! through callbacks.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout_at;

use crate::amf::AmfValue;
use crate::client::config::{ParsedUrl, PublisherConfig};
use crate::client::CredentialSource;
use crate::error::{Error, ProtocolError, Result};
use crate::media::muxer::{MediaHandle, MediaKind, MediaQueues, Muxer};
use crate::protocol::chunk::{ChunkDecoder, ChunkEncoder, RtmpChunk};
use crate::protocol::constants::*;
use crate::protocol::handshake;
use crate::protocol::message::{self, Command, DataMessage, RtmpMessage, UserControlEvent};
use crate::stats::SharedStats;
use crate::transport::{Transport, TransportReader, TransportWriter};

/// Capacity of the reader-to-session message channel
const INBOUND_CHANNEL_DEPTH: usize = 64;

/// Capacity of the session event channel
const EVENT_CHANNEL_DEPTH: usize = 64;

/// Unanswered pings tolerated before the peer is declared dead
const MAX_UNANSWERED_PINGS: u32 = 2;

/// Publishing session lifecycle
///
/// Advances monotonically; backward transitions occur only via `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    TcpConnected,
    HandshakeC1Sent,
    HandshakeC2Sent,
    NetconnectSent,
    StreamCreated,
    Publishing,
    Streaming,
    Closing,
}

impl SessionState {
    /// True while media submitted by producers can still reach the wire
    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::TcpConnected => "tcp-connected",
            SessionState::HandshakeC1Sent => "handshake-c1-sent",
            SessionState::HandshakeC2Sent => "handshake-c2-sent",
            SessionState::NetconnectSent => "netconnect-sent",
            SessionState::StreamCreated => "stream-created",
            SessionState::Publishing => "publishing",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Notifications posted on the session event channel
#[derive(Debug)]
pub enum SessionEvent {
    /// The session moved to a new state
    StateChanged(SessionState),
    /// The ingest accepted the publish; media is flowing
    PublishStarted { stream_id: u32 },
    /// Frames were discarded under backpressure (not an error)
    FramesDropped { kind: MediaKind, count: u64 },
    /// The session ended; `error` is `None` on a requested disconnect
    Closed { error: Option<String> },
}

struct Shutdown {
    flag: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    fn triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        while !self.triggered() {
            let notified = self.notify.notified();
            if self.triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle for requesting a graceful disconnect from another task
#[derive(Clone)]
pub struct Disconnector {
    shutdown: Arc<Shutdown>,
}

impl Disconnector {
    /// Flip the session to `Closing`; pending I/O returns `Cancelled`
    pub fn disconnect(&self) {
        self.shutdown.trigger();
    }
}

/// Items posted by the reader task
enum ReaderItem {
    /// A whole inbound message
    Message(RtmpMessage),
    /// A message that failed to parse (payload-level decode error)
    DecodeFailed { type_id: u8, error: Error },
    /// Received-byte count crossed our announced window
    AckDue { received: u32 },
}

/// RTMP publishing client
///
/// Create one per publish, hand the [`MediaHandle`] to the producers, then
/// drive the session to completion with [`RtmpPublisher::run`].
pub struct RtmpPublisher {
    config: PublisherConfig,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    event_tx: mpsc::Sender<SessionEvent>,
    stats: Arc<SharedStats>,
    queues: Option<MediaQueues>,
    media: MediaHandle,
    shutdown: Arc<Shutdown>,
}

impl RtmpPublisher {
    /// Create a publisher and the receiver for its event stream
    pub fn new(config: PublisherConfig) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
        let stats = Arc::new(SharedStats::new());
        let (queues, media) =
            MediaQueues::new(config.max_video_queue, config.max_audio_queue, stats.clone());

        let publisher = Self {
            config,
            state_tx,
            state_rx,
            event_tx,
            stats,
            queues: Some(queues),
            media,
            shutdown: Arc::new(Shutdown::new()),
        };
        (publisher, event_rx)
    }

    /// Create a publisher with credentials pulled from a provisioning source
    pub async fn from_source(
        mut config: PublisherConfig,
        source: &mut dyn CredentialSource,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>)> {
        let creds = source.credentials().await?;
        config.url = creds.url;
        config.stream_key = Some(creds.stream_key);
        Ok(Self::new(config))
    }

    /// Producer-facing media handle (clone per producer task)
    pub fn media_handle(&self) -> MediaHandle {
        self.media.clone()
    }

    /// Session statistics, readable from any task
    pub fn stats(&self) -> Arc<SharedStats> {
        self.stats.clone()
    }

    /// Watch the session state
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Handle for a graceful disconnect
    pub fn disconnector(&self) -> Disconnector {
        Disconnector {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Connect to the configured ingest and drive the session to completion.
    ///
    /// Returns when the session ends: `Ok(())` after a requested disconnect,
    /// the structured error otherwise. The socket is closed and all buffers
    /// released before this returns; a fresh publisher may be created
    /// immediately after.
    pub async fn run(mut self) -> Result<()> {
        let url = match self.config.parse_url() {
            Ok(url) => url,
            Err(e) => return self.fail_before_connect(e).await,
        };

        let transport =
            match Transport::connect(&url.host, url.port, self.config.connect_timeout).await {
                Ok(t) => t,
                Err(e) => return self.fail_before_connect(e).await,
            };

        self.launch(transport, url).await
    }

    /// Drive the session over an already-open duplex stream.
    ///
    /// Used by tests and by integrations that establish the connection
    /// themselves; `run` is the TCP front door.
    pub async fn run_with_stream<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let url = match self.config.parse_url() {
            Ok(url) => url,
            Err(e) => return self.fail_before_connect(e).await,
        };
        self.launch(Transport::new(stream), url).await
    }

    async fn fail_before_connect(&mut self, error: Error) -> Result<()> {
        tracing::warn!(error = %error, "publish failed before connecting");
        let _ = self
            .event_tx
            .send(SessionEvent::Closed {
                error: Some(error.to_string()),
            })
            .await;
        Err(error)
    }

    async fn launch<S>(&mut self, transport: Transport<S>, url: ParsedUrl) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let stream_key = match self.config.effective_stream_key(&url) {
            Ok(key) => key,
            Err(e) => return self.fail_before_connect(e).await,
        };

        let mut transport =
            transport.with_timeouts(self.config.read_timeout, self.config.write_timeout);

        set_state(&self.state_tx, &self.event_tx, SessionState::TcpConnected).await;
        set_state(&self.state_tx, &self.event_tx, SessionState::HandshakeC1Sent).await;

        let handshake_result = handshake::client_handshake(&mut transport).await;
        if let Err(e) = handshake_result {
            return self.close_with(Err(e)).await;
        }
        set_state(&self.state_tx, &self.event_tx, SessionState::HandshakeC2Sent).await;

        let (reader, writer) = transport.into_split();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_DEPTH);
        let reader_task = tokio::spawn(read_loop(
            reader,
            inbound_tx,
            self.config.window_ack_size,
        ));

        let mut session = Session {
            config: self.config.clone(),
            url,
            stream_key,
            writer,
            encoder: ChunkEncoder::new(),
            inbound: inbound_rx,
            pending_inbound: VecDeque::new(),
            state_tx: self.state_tx.clone(),
            event_tx: self.event_tx.clone(),
            stats: self.stats.clone(),
            queues: self.queues.take().expect("session queues already taken"),
            shutdown: self.shutdown.clone(),
            muxer: Muxer::new(),
            pending_commands: HashMap::new(),
            next_txn: 2,
            stream_id: 0,
            peer_window: 0,
            bytes_since_ack: 0,
            unanswered_pings: 0,
            write_buf: BytesMut::with_capacity(8 * 1024),
            video_drops_reported: 0,
            audio_drops_reported: 0,
        };

        let result = session.drive().await;
        session.teardown(&result).await;
        reader_task.abort();

        self.close_with(result).await
    }

    async fn close_with(&mut self, result: Result<()>) -> Result<()> {
        if *self.state_rx.borrow() != SessionState::Disconnected {
            set_state(&self.state_tx, &self.event_tx, SessionState::Closing).await;
        }
        let _ = self
            .event_tx
            .send(SessionEvent::Closed {
                error: result.as_ref().err().map(|e| e.to_string()),
            })
            .await;
        set_state(&self.state_tx, &self.event_tx, SessionState::Disconnected).await;
        result
    }
}

async fn set_state(
    state_tx: &watch::Sender<SessionState>,
    event_tx: &mpsc::Sender<SessionEvent>,
    state: SessionState,
) {
    if *state_tx.borrow() == state {
        return;
    }
    tracing::info!(state = %state, "session state");
    let _ = state_tx.send(state);
    let _ = event_tx.send(SessionEvent::StateChanged(state)).await;
}

/// Inbound reader task: decode chunks, apply chunk-level protocol control
/// locally, post whole messages to the session. Never writes to the socket.
async fn read_loop<S>(
    mut reader: TransportReader<S>,
    tx: mpsc::Sender<ReaderItem>,
    ack_window: u32,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut decoder = ChunkDecoder::new();
    let mut buf = BytesMut::with_capacity(16 * 1024);
    let mut received: u64 = 0;
    let mut last_acked: u64 = 0;

    loop {
        match reader.read_buf(&mut buf).await {
            Ok(n) => received += n as u64,
            Err(e) => {
                tracing::debug!(error = %e, "inbound reader closing");
                return;
            }
        }

        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(chunk)) => match RtmpMessage::from_chunk(&chunk) {
                    Ok(RtmpMessage::SetChunkSize(size)) => {
                        tracing::debug!(size, "peer set chunk size");
                        decoder.set_chunk_size(size);
                    }
                    Ok(RtmpMessage::Abort { csid }) => {
                        tracing::debug!(csid, "peer aborted chunk stream");
                        decoder.abort(csid);
                    }
                    Ok(msg) => {
                        if tx.send(ReaderItem::Message(msg)).await.is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        let item = ReaderItem::DecodeFailed {
                            type_id: chunk.message_type,
                            error,
                        };
                        if tx.send(item).await.is_err() {
                            return;
                        }
                    }
                },
                Ok(None) => break,
                Err(error) => {
                    tracing::debug!(error = %error, "chunk stream desynchronized");
                    let _ = tx
                        .send(ReaderItem::DecodeFailed { type_id: 0, error })
                        .await;
                    return;
                }
            }
        }

        if ack_window > 0 && received - last_acked >= ack_window as u64 {
            last_acked = received;
            if tx
                .send(ReaderItem::AckDue {
                    received: received as u32,
                })
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

/// Per-connection session driver; the sole socket writer
struct Session<S> {
    config: PublisherConfig,
    url: ParsedUrl,
    stream_key: String,
    writer: TransportWriter<S>,
    encoder: ChunkEncoder,
    inbound: mpsc::Receiver<ReaderItem>,
    /// Items deferred while waiting on the peer window
    pending_inbound: VecDeque<ReaderItem>,
    state_tx: watch::Sender<SessionState>,
    event_tx: mpsc::Sender<SessionEvent>,
    stats: Arc<SharedStats>,
    queues: MediaQueues,
    shutdown: Arc<Shutdown>,
    muxer: Muxer,
    /// Transaction id -> command name, for response correlation
    pending_commands: HashMap<u32, &'static str>,
    next_txn: u32,
    stream_id: u32,
    /// Peer window size; 0 until the server announces one
    peer_window: u32,
    bytes_since_ack: u64,
    unanswered_pings: u32,
    write_buf: BytesMut,
    video_drops_reported: u64,
    audio_drops_reported: u64,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    async fn set_state(&mut self, state: SessionState) {
        set_state(&self.state_tx, &self.event_tx, state).await;
    }

    fn next_txn(&mut self) -> u32 {
        let txn = self.next_txn;
        self.next_txn += 1;
        txn
    }

    async fn drive(&mut self) -> Result<()> {
        // connect
        let cmd = connect_command(&self.url, &self.config.flash_ver);
        self.pending_commands.insert(1, CMD_CONNECT);
        self.send_command(cmd, CSID_COMMAND).await?;
        self.set_state(SessionState::NetconnectSent).await;
        self.await_result(1).await?;
        tracing::info!(app = %self.url.app, host = %self.url.host, "ingest accepted connect");

        // flow-control announcements, then raise our outgoing chunk size
        self.send_control(RtmpMessage::SetChunkSize(self.config.chunk_size))
            .await?;
        self.encoder.set_chunk_size(self.config.chunk_size);
        self.send_control(RtmpMessage::WindowAckSize(self.config.window_ack_size))
            .await?;

        // best-effort stream preparation; responses ignored
        let txn = self.next_txn();
        self.pending_commands.insert(txn, CMD_RELEASE_STREAM);
        let cmd = Command::with_args(
            CMD_RELEASE_STREAM,
            txn as f64,
            vec![AmfValue::String(self.stream_key.clone())],
            0,
        );
        self.send_command(cmd, CSID_COMMAND).await?;

        let txn = self.next_txn();
        self.pending_commands.insert(txn, CMD_FC_PUBLISH);
        let cmd = Command::with_args(
            CMD_FC_PUBLISH,
            txn as f64,
            vec![AmfValue::String(self.stream_key.clone())],
            0,
        );
        self.send_command(cmd, CSID_COMMAND).await?;

        // createStream; its _result carries the message stream id
        let txn = self.next_txn();
        self.pending_commands.insert(txn, CMD_CREATE_STREAM);
        let cmd = Command::with_args(CMD_CREATE_STREAM, txn as f64, vec![], 0);
        self.send_command(cmd, CSID_COMMAND).await?;
        let result = self.await_result(txn).await?;
        self.stream_id = result.result_number().map(|n| n as u32).unwrap_or(1);
        self.set_state(SessionState::StreamCreated).await;
        tracing::debug!(stream_id = self.stream_id, "stream created");

        // publish, by convention on transaction id 0
        let cmd = Command::with_args(
            CMD_PUBLISH,
            0.0,
            vec![
                AmfValue::String(self.stream_key.clone()),
                AmfValue::String("live".into()),
            ],
            self.stream_id,
        );
        self.send_command(cmd, CSID_STREAM).await?;
        self.set_state(SessionState::Publishing).await;

        self.await_publish_start().await?;
        self.set_state(SessionState::Streaming).await;
        let _ = self
            .event_tx
            .send(SessionEvent::PublishStarted {
                stream_id: self.stream_id,
            })
            .await;
        tracing::info!(stream_id = self.stream_id, "publishing started");

        self.send_metadata().await?;

        self.streaming_loop().await
    }

    /// Wait for `_result` matching `txn` while servicing control messages
    async fn await_result(&mut self, txn: u32) -> Result<Command> {
        let deadline = tokio::time::Instant::now() + self.config.read_timeout;
        loop {
            let item = self.next_inbound(deadline).await?;
            let Some(cmd) = self.process_passive(item, true).await? else {
                continue;
            };

            let cmd_txn = cmd.transaction_id as u32;
            match cmd.name.as_str() {
                CMD_RESULT if cmd_txn == txn => {
                    self.pending_commands.remove(&txn);
                    return Ok(cmd);
                }
                CMD_ERROR if cmd_txn == txn => {
                    self.pending_commands.remove(&txn);
                    let desc = cmd
                        .description()
                        .or(cmd.status_code())
                        .unwrap_or("server returned _error")
                        .to_string();
                    return Err(ProtocolError::CommandRejected(desc).into());
                }
                CMD_RESULT | CMD_ERROR => {
                    // Response to a best-effort command (releaseStream, FCPublish)
                    let name = self.pending_commands.remove(&cmd_txn);
                    tracing::debug!(txn = cmd_txn, command = ?name, "ignoring uncorrelated response");
                }
                other => {
                    tracing::debug!(command = other, "ignoring command while awaiting result");
                }
            }
        }
    }

    /// Wait for `onStatus` with `NetStream.Publish.Start`
    async fn await_publish_start(&mut self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.config.read_timeout;
        loop {
            let item = self.next_inbound(deadline).await?;
            let Some(cmd) = self.process_passive(item, true).await? else {
                continue;
            };

            if cmd.name == CMD_ON_STATUS {
                match cmd.status_code() {
                    Some(NS_PUBLISH_START) => return Ok(()),
                    Some(code @ (NS_PUBLISH_BAD_NAME | NS_PUBLISH_FAILED)) => {
                        return Err(ProtocolError::CommandRejected(code.to_string()).into());
                    }
                    Some(code) if code.starts_with("NetStream.Play.") => {
                        tracing::debug!(code, "ignoring play status as publisher");
                    }
                    Some(code) => {
                        tracing::debug!(code, "ignoring status");
                    }
                    None => {}
                }
            } else if cmd.name == CMD_ERROR {
                let desc = cmd
                    .description()
                    .or(cmd.status_code())
                    .unwrap_or("publish rejected")
                    .to_string();
                return Err(ProtocolError::CommandRejected(desc).into());
            }
        }
    }

    /// Send @setDataFrame/onMetaData with the configured stream properties
    async fn send_metadata(&mut self) -> Result<()> {
        let data = DataMessage {
            name: CMD_SET_DATA_FRAME.to_string(),
            values: vec![
                AmfValue::String(CMD_ON_METADATA.into()),
                self.config.metadata.to_ecma(),
            ],
            stream_id: self.stream_id,
        };
        let (message_type, payload) = RtmpMessage::Data(data).encode();
        self.send_chunk(RtmpChunk {
            csid: CSID_STREAM,
            timestamp: 0,
            message_type,
            stream_id: self.stream_id,
            payload,
        })
        .await
    }

    /// Steady state: drain media, answer control traffic, ping the peer
    async fn streaming_loop(&mut self) -> Result<()> {
        let start = tokio::time::Instant::now();
        let mut keepalive = tokio::time::interval_at(
            start + self.config.keepalive_interval,
            self.config.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let epoch = Instant::now();

        loop {
            if self.queues.is_stalled() {
                return Err(ProtocolError::WriteStalled.into());
            }

            if let Some(item) = self.pending_inbound.pop_front() {
                self.handle_streaming_item(item).await?;
                continue;
            }

            tokio::select! {
                _ = self.shutdown.wait() => return Ok(()),

                maybe = self.inbound.recv() => match maybe {
                    Some(item) => self.handle_streaming_item(item).await?,
                    None => return Err(Error::ConnectionClosed),
                },

                _ = self.queues.ready() => {
                    self.drain_media().await?;
                }

                _ = keepalive.tick() => {
                    self.send_keepalive(&epoch).await?;
                }
            }

            // A notify permit may have been consumed by a racing branch
            self.drain_media().await?;
        }
    }

    async fn handle_streaming_item(&mut self, item: ReaderItem) -> Result<()> {
        let Some(cmd) = self.process_passive(item, false).await? else {
            return Ok(());
        };

        match cmd.name.as_str() {
            CMD_ON_STATUS => match cmd.status_code() {
                Some(code @ (NS_PUBLISH_BAD_NAME | NS_PUBLISH_FAILED)) => {
                    return Err(ProtocolError::CommandRejected(code.to_string()).into());
                }
                Some(code) => {
                    tracing::debug!(code, "status while streaming");
                }
                None => {}
            },
            CMD_ERROR => {
                let desc = cmd
                    .description()
                    .or(cmd.status_code())
                    .unwrap_or("server returned _error")
                    .to_string();
                return Err(ProtocolError::CommandRejected(desc).into());
            }
            other => {
                tracing::debug!(command = other, "ignoring command while streaming");
            }
        }
        Ok(())
    }

    /// Service control traffic. Returns a command message for the caller,
    /// `None` for anything handled here.
    async fn process_passive(
        &mut self,
        item: ReaderItem,
        strict_commands: bool,
    ) -> Result<Option<Command>> {
        let msg = match item {
            ReaderItem::Message(msg) => msg,
            ReaderItem::DecodeFailed { type_id, error } => {
                if strict_commands && type_id == MSG_COMMAND_AMF0 {
                    // A correlated response may be in the unparseable message
                    return Err(error);
                }
                tracing::debug!(type_id, error = %error, "skipping undecodable message");
                return Ok(None);
            }
            ReaderItem::AckDue { received } => {
                self.send_control(RtmpMessage::Acknowledgement { sequence: received })
                    .await?;
                return Ok(None);
            }
        };

        match msg {
            RtmpMessage::WindowAckSize(size) => {
                tracing::debug!(size, "peer window size");
                // A window update restarts the since-last-ack accounting
                self.peer_window = size;
                self.bytes_since_ack = 0;
            }
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                tracing::debug!(size, limit_type, "peer bandwidth");
                self.send_control(RtmpMessage::WindowAckSize(size)).await?;
            }
            RtmpMessage::Acknowledgement { sequence } => {
                tracing::trace!(sequence, "peer acknowledged");
                self.bytes_since_ack = 0;
            }
            RtmpMessage::UserControl(UserControlEvent::PingRequest(ts)) => {
                self.send_control(RtmpMessage::UserControl(UserControlEvent::PingResponse(ts)))
                    .await?;
            }
            RtmpMessage::UserControl(UserControlEvent::PingResponse(_)) => {
                self.unanswered_pings = 0;
            }
            RtmpMessage::UserControl(UserControlEvent::StreamBegin(id)) => {
                tracing::debug!(stream_id = id, "stream begin");
            }
            RtmpMessage::UserControl(UserControlEvent::StreamEof(id)) => {
                tracing::debug!(stream_id = id, "stream EOF from peer");
                return Err(Error::ConnectionClosed);
            }
            RtmpMessage::UserControl(UserControlEvent::Unknown { event_type, .. }) => {
                tracing::debug!(event_type, "ignoring user-control event");
            }
            RtmpMessage::Command(cmd) => return Ok(Some(cmd)),
            RtmpMessage::SetChunkSize(_) | RtmpMessage::Abort { .. } => {
                // Handled by the reader directly above the chunk decoder
            }
            RtmpMessage::Audio { .. } | RtmpMessage::Video { .. } | RtmpMessage::Data(_) => {
                // A publisher does not consume media
            }
            RtmpMessage::Unknown { type_id, .. } => {
                tracing::debug!(type_id, "ignoring message");
            }
        }
        Ok(None)
    }

    /// Pop a deferred item or receive from the reader before `deadline`
    async fn next_inbound(&mut self, deadline: tokio::time::Instant) -> Result<ReaderItem> {
        if let Some(item) = self.pending_inbound.pop_front() {
            return Ok(item);
        }
        tokio::select! {
            _ = self.shutdown.wait() => Err(Error::Cancelled),
            recv = timeout_at(deadline, self.inbound.recv()) => match recv {
                Err(_) => Err(Error::Timeout),
                Ok(None) => Err(Error::ConnectionClosed),
                Ok(Some(item)) => Ok(item),
            }
        }
    }

    async fn send_keepalive(&mut self, epoch: &Instant) -> Result<()> {
        let ts = epoch.elapsed().as_millis() as u32;
        self.send_control(RtmpMessage::UserControl(UserControlEvent::PingRequest(ts)))
            .await?;
        self.unanswered_pings += 1;
        if self.unanswered_pings >= MAX_UNANSWERED_PINGS {
            tracing::warn!(
                missed = self.unanswered_pings,
                "peer silent, closing session"
            );
            return Err(Error::PeerSilent);
        }
        Ok(())
    }

    /// Drain the media queues onto the wire
    async fn drain_media(&mut self) -> Result<()> {
        loop {
            if self.queues.is_stalled() {
                return Err(ProtocolError::WriteStalled.into());
            }

            let audio = self.queues.pop_audio();
            let video = self.queues.pop_video();
            if audio.is_none() && video.is_none() {
                break;
            }

            if let Some(frame) = audio {
                let (body, ts) = self.muxer.audio_tag(&frame);
                self.send_media(CSID_AUDIO, MSG_AUDIO, ts, body, false).await?;
                self.stats.incr_audio_frames();
            }

            if let Some(frame) = video {
                let is_keyframe = frame.is_keyframe;
                let (body, ts) = self.muxer.video_tag(&frame);
                self.send_media(CSID_VIDEO, MSG_VIDEO, ts, body, is_keyframe)
                    .await?;
                self.stats.incr_video_frames();
            }
        }

        self.report_drops().await;
        Ok(())
    }

    async fn send_media(
        &mut self,
        csid: u32,
        message_type: u8,
        timestamp: u32,
        payload: bytes::Bytes,
        is_keyframe: bool,
    ) -> Result<()> {
        let chunk = RtmpChunk {
            csid,
            timestamp,
            message_type,
            stream_id: self.stream_id,
            payload,
        };
        match self.send_chunk(chunk).await {
            Ok(()) => Ok(()),
            // A keyframe that cannot be written ends the session
            Err(Error::Timeout) if is_keyframe => Err(ProtocolError::WriteStalled.into()),
            Err(e) => Err(e),
        }
    }

    /// Post backpressure-drop events for counters not yet reported
    async fn report_drops(&mut self) {
        let video = self.stats.video_dropped();
        if video > self.video_drops_reported {
            let count = video - self.video_drops_reported;
            self.video_drops_reported = video;
            let _ = self.event_tx.try_send(SessionEvent::FramesDropped {
                kind: MediaKind::Video,
                count,
            });
        }
        let audio = self.stats.audio_dropped();
        if audio > self.audio_drops_reported {
            let count = audio - self.audio_drops_reported;
            self.audio_drops_reported = audio;
            let _ = self.event_tx.try_send(SessionEvent::FramesDropped {
                kind: MediaKind::Audio,
                count,
            });
        }
    }

    async fn send_command(&mut self, cmd: Command, csid: u32) -> Result<()> {
        tracing::debug!(command = %cmd.name, txn = cmd.transaction_id, "sending command");
        let payload = message::encode_command(&cmd);
        self.send_chunk(RtmpChunk {
            csid,
            timestamp: 0,
            message_type: MSG_COMMAND_AMF0,
            stream_id: cmd.stream_id,
            payload,
        })
        .await
    }

    /// Write a protocol control message; exempt from window accounting
    async fn send_control(&mut self, msg: RtmpMessage) -> Result<()> {
        let (message_type, payload) = msg.encode();
        let chunk = RtmpChunk {
            csid: CSID_PROTOCOL_CONTROL,
            timestamp: 0,
            message_type,
            stream_id: 0,
            payload,
        };
        self.write_chunk(chunk).await
    }

    /// Write a message, yielding first if it would overrun the peer window
    async fn send_chunk(&mut self, chunk: RtmpChunk) -> Result<()> {
        let estimated = chunk.payload.len() as u64 + 16;
        while self.peer_window > 0
            && self.bytes_since_ack + estimated > self.peer_window as u64
        {
            tracing::debug!(
                window = self.peer_window,
                in_flight = self.bytes_since_ack,
                "waiting for acknowledgement"
            );
            // Receive straight from the reader here: deferred items have
            // already been inspected and cannot reopen the window.
            let deadline = tokio::time::Instant::now() + self.config.read_timeout;
            let item = tokio::select! {
                _ = self.shutdown.wait() => return Err(Error::Cancelled),
                recv = timeout_at(deadline, self.inbound.recv()) => match recv {
                    Err(_) => return Err(Error::Timeout),
                    Ok(None) => return Err(Error::ConnectionClosed),
                    Ok(Some(item)) => item,
                }
            };
            match item {
                ReaderItem::Message(RtmpMessage::Acknowledgement { sequence }) => {
                    tracing::trace!(sequence, "window reopened");
                    self.bytes_since_ack = 0;
                }
                ReaderItem::Message(RtmpMessage::WindowAckSize(size)) => {
                    self.peer_window = size;
                    self.bytes_since_ack = 0;
                }
                other => self.pending_inbound.push_back(other),
            }
        }
        self.write_chunk(chunk).await
    }

    async fn write_chunk(&mut self, chunk: RtmpChunk) -> Result<()> {
        self.write_buf.clear();
        self.encoder.encode(&chunk, &mut self.write_buf);
        let len = self.write_buf.len() as u64;
        self.writer.write_all(&self.write_buf).await?;
        self.bytes_since_ack += len;
        self.stats.add_bytes_sent(len);
        Ok(())
    }

    /// Graceful teardown: best-effort unpublish, close, drain
    async fn teardown(&mut self, result: &Result<()>) {
        self.set_state(SessionState::Closing).await;

        // Best-effort FCUnpublish + deleteStream; failures ignored
        if self.stream_id != 0 && !matches!(result, Err(Error::Io(_) | Error::ConnectionClosed)) {
            let txn = self.next_txn();
            let cmd = Command::with_args(
                CMD_FC_UNPUBLISH,
                txn as f64,
                vec![AmfValue::String(self.stream_key.clone())],
                0,
            );
            let _ = self.send_command(cmd, CSID_COMMAND).await;

            let txn = self.next_txn();
            let cmd = Command::with_args(
                CMD_DELETE_STREAM,
                txn as f64,
                vec![AmfValue::Number(self.stream_id as f64)],
                0,
            );
            let _ = self.send_command(cmd, CSID_COMMAND).await;
        }

        let _ = self.writer.shutdown().await;
        self.queues.drain();
        self.report_drops().await;
    }
}

/// Build the `connect` command with the FMLE-compatible property ordering
fn connect_command(url: &ParsedUrl, flash_ver: &str) -> Command {
    let obj = AmfValue::Object(vec![
        ("app".into(), AmfValue::String(url.app.clone())),
        ("type".into(), AmfValue::String("nonprivate".into())),
        ("flashVer".into(), AmfValue::String(flash_ver.to_string())),
        ("tcUrl".into(), AmfValue::String(url.tc_url.clone())),
        ("fpad".into(), AmfValue::Boolean(false)),
        ("capabilities".into(), AmfValue::Number(CAPS_DEFAULT)),
        ("audioCodecs".into(), AmfValue::Number(AUDIO_CODECS_DEFAULT)),
        ("videoCodecs".into(), AmfValue::Number(VIDEO_CODECS_DEFAULT)),
        (
            "videoFunction".into(),
            AmfValue::Number(VIDEO_FUNCTION_DEFAULT),
        ),
    ]);
    Command {
        name: CMD_CONNECT.to_string(),
        transaction_id: 1.0,
        command_object: obj,
        arguments: vec![],
        stream_id: 0,
    }
}
