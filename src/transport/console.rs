use super::session::{Identity, Reply, ServerEvent, Session};
use super::{ErrorSink, LivenessNotifier, Transport, TransportError};
use async_trait::async_trait;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Transport that writes relayed lines to stdout as `<channel> <message>`.
///
/// Used for dry runs and for operating the relay behind a pipe. It behaves
/// like a well-connected chat server: every send and every probe counts as
/// inbound traffic, and sending while disconnected reports an error.
#[derive(Debug)]
pub struct ConsoleTransport {
    session: Mutex<Session>,
    connected: AtomicBool,
    errors: ErrorSink,
    liveness: LivenessNotifier,
}

impl ConsoleTransport {
    pub fn new(identity: Identity, errors: ErrorSink, liveness: LivenessNotifier) -> Self {
        Self {
            session: Mutex::new(Session::new(identity)),
            connected: AtomicBool::new(false),
            errors,
            liveness,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Current nick; changes when the server reports it taken.
    pub fn nick(&self) -> String {
        self.with_session(|s| s.nick().to_string())
    }

    /// Process one inbound server event and return the reply that was sent.
    pub fn receive(&self, event: ServerEvent) -> Option<Reply> {
        self.liveness.notify();
        let reply = self.with_session(|s| s.handle(&event))?;
        match &reply {
            Reply::Pong(token) => tracing::debug!(token = %token, "PING received, sending PONG"),
            Reply::Nick(nick) => tracing::info!(nick = %nick, "Requesting new nick"),
        }
        Some(reply)
    }

    fn identity(&self) -> Identity {
        self.with_session(|s| s.identity().clone())
    }

    fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        // Session updates are single assignments; a poisoned lock still holds a whole value.
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn connect(&self) {
        self.connected.store(true, Ordering::Release);
        self.liveness.notify();
        let identity = self.identity();
        tracing::info!(
            server = %identity.server,
            tls = identity.tls,
            nick = %identity.nick,
            name = %identity.name,
            "Console transport connected"
        );
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::info!(server = %self.identity().server, "Console transport disconnected");
        }
    }

    async fn join(&self, channels: &[String]) {
        if !self.is_connected() {
            self.errors
                .report(TransportError::Protocol("join before connect".into()));
            return;
        }
        tracing::info!(nick = %self.nick(), channels = ?channels, "Joining channels");
    }

    async fn send_bulk(&self, channels: &[String], message: &str) {
        if !self.is_connected() {
            self.errors
                .report(TransportError::Send("console transport not connected".into()));
            return;
        }

        let mut stdout = std::io::stdout().lock();
        for channel in channels {
            if let Err(e) = writeln!(stdout, "{channel} {message}") {
                self.errors.report(TransportError::Send(e.to_string()));
                return;
            }
        }
        self.liveness.notify();
    }

    async fn ping(&self) {
        if self.is_connected() {
            self.liveness.notify();
        }
    }
}
