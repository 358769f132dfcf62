//! Live detection stream connection manager.
//!
//! [`StreamManager`] owns at most one realtime connection at a time. A
//! new connection is opened only when the parameter set changes (or on an
//! explicit [`StreamManager::reconnect`]); there is no automatic retry.
//!
//! Each connection runs in its own task (a "session") holding a
//! [`Generation`] token and a [`CancellationToken`]. Every state mutation
//! from that task goes through [`Generations::apply`], so once a session
//! is torn down nothing it still has in flight can touch the manager's
//! state.
//!
//! Platform-level events are broadcast via a [`tokio::sync::broadcast`]
//! channel. Call [`StreamManager::subscribe`] to receive them.

use std::sync::Arc;
use std::time::Duration;

use laneguard_core::params::StreamParams;
use laneguard_core::types::{ConnectionState, StreamMessage};
use laneguard_core::{Generation, Generations};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{realtime_ws_url, StreamConnector, StreamError, StreamTransport, TransportEvent};
use crate::events::{ClientEvent, EVENT_CHANNEL_CAPACITY};
use crate::messages::parse_message;
use crate::slot::{LatestReceiver, LatestSlot};

/// How long teardown waits for a session task to finish closing.
const SESSION_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Manages the single live connection to the realtime endpoint.
pub struct StreamManager {
    connector: Arc<dyn StreamConnector>,
    ws_url: String,
    ctx: Arc<StreamContext>,
    session: Option<Session>,
}

/// State shared between the manager and its session task.
struct StreamContext {
    generations: Generations,
    state_tx: watch::Sender<ConnectionState>,
    latest: LatestSlot<StreamMessage>,
    error_tx: watch::Sender<Option<String>>,
    event_tx: broadcast::Sender<ClientEvent>,
}

/// Bookkeeping for the currently open connection.
struct Session {
    params: StreamParams,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamManager {
    /// Create a manager with no open connection.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://127.0.0.1:8000`.
    pub fn new(connector: Arc<dyn StreamConnector>, ws_url: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (error_tx, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            connector,
            ws_url: ws_url.into(),
            ctx: Arc::new(StreamContext {
                generations: Generations::new(),
                state_tx,
                latest: LatestSlot::new(),
                error_tx,
                event_tx,
            }),
            session: None,
        }
    }

    /// Apply a parameter set.
    ///
    /// Opens the first connection, or replaces the current one when
    /// `params` differ from the active set. An identical set while a
    /// session exists is a no-op. Invalid parameters are rejected before
    /// the current connection is touched.
    pub async fn set_params(&mut self, params: StreamParams) -> Result<(), StreamError> {
        let params = params.validated()?;
        if self.session.as_ref().is_some_and(|s| s.params == params) {
            tracing::debug!("Stream parameters unchanged; keeping connection");
            return Ok(());
        }
        let url = realtime_ws_url(&self.ws_url, &params)?;
        self.teardown().await;
        self.open(params, url);
        Ok(())
    }

    /// Tear down and re-open with the current parameters.
    ///
    /// Does nothing when no parameter set has been applied yet.
    pub async fn reconnect(&mut self) -> Result<(), StreamError> {
        let Some(params) = self.session.as_ref().map(|s| s.params.clone()) else {
            return Ok(());
        };
        let url = realtime_ws_url(&self.ws_url, &params)?;
        self.teardown().await;
        self.open(params, url);
        Ok(())
    }

    /// Close the connection and stop all state mutation from it.
    pub async fn shutdown(&mut self) {
        tracing::info!("Shutting down stream manager");
        self.teardown().await;
        self.ctx.set_state(ConnectionState::Disconnected);
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.ctx.state_tx.borrow()
    }

    /// Receiver that wakes on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.ctx.state_tx.subscribe()
    }

    /// The most recently decoded message, if any.
    pub fn latest(&self) -> Option<Arc<StreamMessage>> {
        self.ctx.latest.get()
    }

    /// Receiver for the single-slot latest-message cell.
    pub fn watch_latest(&self) -> LatestReceiver<StreamMessage> {
        self.ctx.latest.subscribe()
    }

    /// The last transport error reported for the current session.
    pub fn last_error(&self) -> Option<String> {
        self.ctx.error_tx.borrow().clone()
    }

    /// Subscribe to stream-level client events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.ctx.event_tx.subscribe()
    }

    /// The parameter set of the current session.
    pub fn params(&self) -> Option<&StreamParams> {
        self.session.as_ref().map(|s| &s.params)
    }

    // ---- private helpers ----

    fn open(&mut self, params: StreamParams, url: String) {
        let generation = self.ctx.generations.advance();
        self.ctx.generations.apply(generation, || {
            self.ctx.error_tx.send_replace(None);
            self.ctx.set_state(ConnectionState::Connecting);
        });

        let cancel = CancellationToken::new();
        let ctx = Arc::clone(&self.ctx);
        let connector = Arc::clone(&self.connector);
        let session_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            tracing::debug!(generation = generation.value(), url = %url, "Starting stream session");
            run_session(connector, url, ctx, generation, session_cancel).await;
            tracing::debug!(generation = generation.value(), "Stream session exited");
        });

        self.session = Some(Session {
            params,
            cancel,
            task,
        });
    }

    /// Invalidate the current session, then wait for its task to close
    /// the transport.
    async fn teardown(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.ctx.generations.invalidate();
        session.cancel.cancel();

        let mut task = session.task;
        if tokio::time::timeout(SESSION_STOP_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            tracing::warn!("Stream session did not stop in time; aborting");
            task.abort();
        }
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.ctx.generations.invalidate();
        if let Some(session) = self.session.take() {
            // The session task closes its transport on cancellation.
            session.cancel.cancel();
        }
    }
}

impl StreamContext {
    /// Must be called from inside `generations.apply` (or by the owner).
    fn set_state(&self, state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            let _ = self
                .event_tx
                .send(ClientEvent::StreamStateChanged { state });
        }
    }

    fn report_error(&self, error: String) {
        self.error_tx.send_replace(Some(error.clone()));
        let _ = self.event_tx.send(ClientEvent::StreamError { error });
    }
}

/// Connect, then pump transport events into the shared context until the
/// connection closes or the session is cancelled.
async fn run_session(
    connector: Arc<dyn StreamConnector>,
    url: String,
    ctx: Arc<StreamContext>,
    generation: Generation,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = connector.connect(&url) => result,
    };

    let mut transport = match connected {
        Ok(transport) => transport,
        Err(e) => {
            tracing::warn!(error = %e, "Realtime stream connection failed");
            ctx.generations.apply(generation, || {
                ctx.report_error(e.to_string());
                ctx.set_state(ConnectionState::Disconnected);
            });
            return;
        }
    };

    if ctx
        .generations
        .apply(generation, || ctx.set_state(ConnectionState::Connected))
        .is_none()
    {
        // Superseded while the handshake was in flight.
        transport.close().await;
        return;
    }

    pump_events(&mut transport, &ctx, generation, &cancel).await;
}

async fn pump_events(
    transport: &mut Box<dyn StreamTransport>,
    ctx: &StreamContext,
    generation: Generation,
    cancel: &CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                transport.close().await;
                return;
            }
            event = transport.next_event() => event,
        };

        match event {
            TransportEvent::Text(text) => match parse_message(&text) {
                Ok(message) => {
                    ctx.generations
                        .apply(generation, || ctx.latest.publish(message));
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping malformed stream message");
                }
            },
            TransportEvent::Error(error) => {
                tracing::warn!(error = %error, "Realtime stream transport error");
                ctx.generations.apply(generation, || ctx.report_error(error));
            }
            TransportEvent::Closed => {
                tracing::info!("Realtime stream disconnected");
                ctx.generations
                    .apply(generation, || ctx.set_state(ConnectionState::Disconnected));
                return;
            }
        }
    }
}
