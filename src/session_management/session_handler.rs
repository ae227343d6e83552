//! SSH-like connection state machine.
//!
//! ```text
//! CONNECTED ──banner──▶ hello (bounded) ──connection event──▶ AUTHENTICATING
//!     AUTHENTICATING ──accepted──▶ SHELL ──exit/EOF/timeout──▶ CLOSED
//!     AUTHENTICATING ──3 failures──▶ REJECTED
//! ```
//!
//! Every event of a connection carries the same session id and is recorded
//! in protocol order. Once the shell is entered a `session_end` event is
//! guaranteed, whichever way the shell stops.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::configuration::types::{DecoyKind, ListenerConfig};
use crate::deception::{CommandInterpreter, FactGenerator, VirtualFs};
use crate::error_handling::types::SessionError;
use crate::events::recorder::EventSink;
use crate::events::types::{Event, EventPayload};
use crate::geoip::GeoLocator;
use crate::session_management::credentials;
use crate::session_management::session::Session;
use crate::session_management::terminal::{KeyAction, Terminal};
use crate::session_management::SessionStatus;

pub const PROTOCOL: &str = DecoyKind::SshLike.protocol();
pub const MAX_AUTH_ATTEMPTS: u32 = 3;
const EXIT_COMMANDS: [&str; 3] = ["exit", "quit", "logout"];
const WELCOME: &str =
    "\r\nWelcome to Ubuntu 18.04.1 LTS (GNU/Linux 4.15.0-20-generic x86_64)\r\n\r\n";
const LAST_LOGIN_FROM: &str = "192.168.1.1";

/// Per-listener knobs of the SSH-like decoy.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub banner: String,
    pub hostname: String,
    pub shell_name: String,
    pub hello_timeout: Duration,
    pub credential_timeout: Duration,
    pub session_timeout: Duration,
}

impl From<&ListenerConfig> for SessionSettings {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            banner: config.banner.clone(),
            hostname: config.hostname.clone(),
            shell_name: config.shell_name.clone(),
            hello_timeout: config.hello_timeout(),
            credential_timeout: config.credential_timeout(),
            session_timeout: config.session_timeout(),
        }
    }
}

pub struct SessionHandler {
    settings: SessionSettings,
    interpreter: CommandInterpreter,
    sink: Arc<dyn EventSink>,
    geo: Arc<dyn GeoLocator>,
}

impl SessionHandler {
    pub fn new(
        settings: SessionSettings,
        sink: Arc<dyn EventSink>,
        geo: Arc<dyn GeoLocator>,
    ) -> Self {
        let interpreter = CommandInterpreter::new(&settings.shell_name);
        Self {
            settings,
            interpreter,
            sink,
            geo,
        }
    }

    /// Drives one connection to completion and returns the final state.
    ///
    /// Transport failures end the session quietly; they are logged, never
    /// surfaced to the caller.
    pub async fn run<S, F>(&self, stream: S, peer: SocketAddr, mut facts: F) -> SessionStatus
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
        F: FactGenerator,
    {
        let mut session = Session::new(peer);
        info!("[{}] Connection from {}", session.id, peer);

        let mut terminal = Terminal::new(stream);
        if let Err(e) = self.drive(&mut session, &mut terminal, &mut facts).await {
            debug!("[{}] Session ended during {:?}: {}", session.id, session.status, e);
        }
        if session.status != SessionStatus::Rejected {
            session.status = SessionStatus::Closed;
        }
        terminal.close().await;

        info!("[{}] Session finished as {:?}", session.id, session.status);
        session.status
    }

    async fn drive<S>(
        &self,
        session: &mut Session,
        terminal: &mut Terminal<S>,
        facts: &mut dyn FactGenerator,
    ) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        terminal.send(format!("{}\r\n", self.settings.banner)).await?;

        let client_banner = terminal.read_hello(self.settings.hello_timeout).await;
        debug!("[{}] Client hello: {:?}", session.id, client_banner);
        self.record(
            session,
            EventPayload::Connection {
                session_id: Some(session.id.clone()),
                banner: self.settings.banner.clone(),
                client_banner,
                request: None,
                geo: Some(self.geo.lookup(session.peer.ip())),
            },
        );

        session.status = SessionStatus::Authenticating;
        if !self.authenticate(session, terminal).await? {
            info!(
                "[{}] Rejected after {} failed logins",
                session.id, session.auth_attempts
            );
            session.status = SessionStatus::Rejected;
            terminal
                .send("\r\nToo many authentication failures\r\n")
                .await?;
            return Ok(());
        }

        session.status = SessionStatus::Shell;
        info!("[{}] Shell opened for '{}'", session.id, session.user);
        let last_login = facts.now().format("%a %b %e %H:%M:%S %Y").to_string();
        terminal
            .send(format!(
                "{}Last login: {} from {}\r\n",
                WELCOME, last_login, LAST_LOGIN_FROM
            ))
            .await?;
        self.shell(session, terminal, facts).await
    }

    /// Prompts for credentials until a pair is accepted or attempts run out.
    async fn authenticate<S>(
        &self,
        session: &mut Session,
        terminal: &mut Terminal<S>,
    ) -> Result<bool, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let wait = self.settings.credential_timeout;
        while session.auth_attempts < MAX_AUTH_ATTEMPTS {
            terminal.send("login: ").await?;
            let user = terminal.read_line(wait).await?;
            terminal.send("Password: ").await?;
            let pass = terminal.read_line(wait).await?;

            session.auth_attempts += 1;
            let accepted = credentials::is_accepted(&user, &pass);
            debug!(
                "[{}] Login attempt {} as '{}': {}",
                session.id,
                session.auth_attempts,
                user,
                if accepted { "accepted" } else { "denied" }
            );
            self.record(
                session,
                EventPayload::AuthAttempt {
                    session_id: session.id.clone(),
                    user: user.clone(),
                    pass,
                    attempt_number: session.auth_attempts,
                },
            );
            session.user = user;

            if accepted {
                return Ok(true);
            }
            terminal
                .send("\r\nPermission denied, please try again.\r\n")
                .await?;
        }
        Ok(false)
    }

    async fn shell<S>(
        &self,
        session: &mut Session,
        terminal: &mut Terminal<S>,
        facts: &mut dyn FactGenerator,
    ) -> Result<(), SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        let deadline = started + self.settings.session_timeout;
        let _end = SessionEndGuard {
            sink: Arc::clone(&self.sink),
            peer: session.peer,
            session_id: session.id.clone(),
            user: session.user.clone(),
            started,
        };

        let mut fs = VirtualFs::new(&session.user, &self.settings.hostname);
        terminal.send(self.prompt(&fs)).await?;

        loop {
            let byte = terminal.next_byte(deadline, "shell").await?;
            match terminal.feed(byte) {
                KeyAction::Echo(byte) => terminal.send([byte]).await?,
                KeyAction::Erase => terminal.send(b"\x08 \x08").await?,
                KeyAction::Interrupt => {
                    terminal.send(format!("^C\r\n{}", self.prompt(&fs))).await?
                }
                KeyAction::EndOfTransmission => return Ok(()),
                KeyAction::Ignore => {}
                KeyAction::Submit(line) => {
                    let command = line.trim();
                    if command.is_empty() {
                        terminal.send(format!("\r\n{}", self.prompt(&fs))).await?;
                        continue;
                    }

                    debug!("[{}] {}$ {}", session.id, session.user, command);
                    self.record(
                        session,
                        EventPayload::Command {
                            session_id: session.id.clone(),
                            user: session.user.clone(),
                            command: command.to_string(),
                        },
                    );

                    if EXIT_COMMANDS.contains(&command.to_lowercase().as_str()) {
                        terminal.send("\r\nlogout\r\n").await?;
                        return Ok(());
                    }

                    fs.record_history(command);
                    let result = self.interpreter.execute(command, &mut fs, &mut *facts);
                    tokio::time::sleep(facts.response_delay()).await;

                    let mut reply = String::from("\r\n");
                    if !result.output.is_empty() {
                        reply.push_str(&result.output.replace('\n', "\r\n"));
                        reply.push_str("\r\n");
                    }
                    reply.push_str(&self.prompt(&fs));
                    terminal.send(reply).await?;
                }
            }
        }
    }

    fn prompt(&self, fs: &VirtualFs) -> String {
        format!("{}@{}:{}$ ", fs.user(), fs.hostname(), fs.prompt_directory())
    }

    fn record(&self, session: &Session, payload: EventPayload) {
        self.sink.record(Event::new(session.peer, PROTOCOL, payload));
    }
}

/// Emits `session_end` when the shell stops, whatever the exit path.
struct SessionEndGuard {
    sink: Arc<dyn EventSink>,
    peer: SocketAddr,
    session_id: String,
    user: String,
    started: Instant,
}

impl Drop for SessionEndGuard {
    fn drop(&mut self) {
        let duration = self.started.elapsed();
        info!(
            "[{}] Shell closed after {:.1}s",
            self.session_id,
            duration.as_secs_f64()
        );
        self.sink.record(Event::new(
            self.peer,
            PROTOCOL,
            EventPayload::SessionEnd {
                session_id: std::mem::take(&mut self.session_id),
                user: std::mem::take(&mut self.user),
                duration_seconds: duration.as_secs_f64(),
            },
        ));
    }
}
