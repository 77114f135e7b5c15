//! SSH server for gatehouse.
//!
//! Accepts SSH connections, authenticates them against the configured
//! user registry, and serves the SFTP subsystem over a per-user confined
//! view of the storage backend.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use russh::keys::ssh_key;
use russh::keys::PrivateKey;
use russh::server::{self, Auth, Msg, Server as _, Session};
use russh::{Channel, ChannelId};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use gatehouse_auth::{AuthDecision, PasswordAuthenticator, PubkeyAuthenticator};
use gatehouse_vfs::{RootedView, StorageOps};

use crate::events::SessionTracker;
use crate::session::SftpSession;

const SFTP_SUBSYSTEM: &str = "sftp";

/// SSH server configuration.
#[derive(Clone)]
pub struct SshServerConfig {
    /// Address the listener binds to.
    pub bind_addr: SocketAddr,
    /// Persisted host identity.
    pub host_key: PrivateKey,
}

impl SshServerConfig {
    /// Config listening on all interfaces at `port`.
    pub fn new(port: u16, host_key: PrivateKey) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            host_key,
        }
    }
}

/// Everything a connection needs, shared across all of them.
///
/// The registry behind the authenticators is immutable and the backend
/// is concurrent-safe, so this is plain `Arc` sharing with no locks.
pub struct SessionHub {
    /// Public-key authenticator.
    pub pubkey: PubkeyAuthenticator,
    /// Password authenticator.
    pub password: PasswordAuthenticator,
    /// Shared storage backend.
    pub backend: Arc<dyn StorageOps>,
    /// Session event tracker.
    pub tracker: Arc<dyn SessionTracker>,
}

/// SSH server.
pub struct SshServer {
    config: SshServerConfig,
    hub: Arc<SessionHub>,
}

impl SshServer {
    /// Create the server. Nothing is bound until [`run`](Self::run).
    pub fn new(config: SshServerConfig, hub: Arc<SessionHub>) -> Self {
        Self { config, hub }
    }

    /// Bind the listener and accept sessions until shutdown.
    pub async fn run(&self) -> Result<(), std::io::Error> {
        let config = russh::server::Config {
            auth_rejection_time: std::time::Duration::from_secs(1),
            auth_rejection_time_initial: Some(std::time::Duration::from_secs(0)),
            keys: vec![self.config.host_key.clone()],
            ..Default::default()
        };

        info!("listening for SFTP sessions on {}", self.config.bind_addr);

        let mut factory = Factory {
            hub: self.hub.clone(),
        };
        let socket = TcpListener::bind(self.config.bind_addr).await?;

        factory
            .run_on_socket(Arc::new(config), &socket)
            .await
            .map_err(std::io::Error::other)
    }
}

/// Server factory - creates a handler for each connection.
struct Factory {
    hub: Arc<SessionHub>,
}

impl server::Server for Factory {
    type Handler = ConnectionHandler;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> Self::Handler {
        ConnectionHandler {
            hub: self.hub.clone(),
            peer_addr,
            username: None,
            channels: HashMap::new(),
        }
    }

    fn handle_session_error(&mut self, error: <Self::Handler as server::Handler>::Error) {
        error!("session error: {error:?}");
    }
}

/// Handler for a single SSH connection.
pub struct ConnectionHandler {
    hub: Arc<SessionHub>,
    peer_addr: Option<SocketAddr>,
    username: Option<String>,
    channels: HashMap<ChannelId, Channel<Msg>>,
}

fn rejected() -> Auth {
    Auth::Reject {
        proceed_with_methods: None,
        partial_success: false,
    }
}

impl server::Handler for ConnectionHandler {
    type Error = russh::Error;

    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &ssh_key::PublicKey,
    ) -> Result<Auth, Self::Error> {
        debug!(user, peer = ?self.peer_addr, "public key auth attempt");

        match self.hub.pubkey.authenticate(user, public_key).await {
            Ok(AuthDecision::Accept) => {
                self.username = Some(user.to_string());
                Ok(Auth::Accept)
            }
            Ok(AuthDecision::Reject) => {
                self.hub.tracker.auth_rejected(user, "publickey");
                Ok(rejected())
            }
            Err(e) => {
                error!(user, "identity authority failure: {e}");
                self.hub.tracker.auth_rejected(user, "publickey");
                Ok(rejected())
            }
        }
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        debug!(user, peer = ?self.peer_addr, "password auth attempt");

        match self.hub.password.authenticate(user, password).await {
            Ok(AuthDecision::Accept) => {
                self.username = Some(user.to_string());
                Ok(Auth::Accept)
            }
            Ok(AuthDecision::Reject) => {
                self.hub.tracker.auth_rejected(user, "password");
                Ok(rejected())
            }
            Err(e) => {
                error!(user, "identity authority failure: {e}");
                self.hub.tracker.auth_rejected(user, "password");
                Ok(rejected())
            }
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        debug!("channel {} opened", channel.id());
        self.channels.insert(channel.id(), channel);
        Ok(true)
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        debug!("channel {channel} closed");
        self.channels.remove(&channel);
        Ok(())
    }

    async fn subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if name != SFTP_SUBSYSTEM {
            debug!("rejecting subsystem {name:?}");
            session.channel_failure(channel_id)?;
            return Ok(());
        }

        let Some(username) = self.username.clone() else {
            error!("SFTP subsystem requested before authentication");
            session.channel_failure(channel_id)?;
            return Ok(());
        };
        let Some(channel) = self.channels.remove(&channel_id) else {
            session.channel_failure(channel_id)?;
            return Ok(());
        };

        // Bind the session to its confined root, creating the user's
        // home on first contact.
        let home = Path::new(&username);
        if let Err(e) = self.hub.backend.mkdir(home).await {
            error!(username, "cannot prepare user root: {e}");
            session.channel_failure(channel_id)?;
            return Ok(());
        }
        let root = match RootedView::confine(self.hub.backend.clone(), home) {
            Ok(root) => root,
            Err(e) => {
                error!(username, "cannot confine user root: {e}");
                session.channel_failure(channel_id)?;
                return Ok(());
            }
        };

        session.channel_success(channel_id)?;

        let tracker = self.hub.tracker.clone();
        let handler = SftpSession::new(username.clone(), root, tracker.clone());

        info!(username, "SFTP session starting");
        tracker.session_opened(&username);
        tokio::spawn(async move {
            russh_sftp::server::run(channel.into_stream(), handler).await;
            tracker.session_closed(&username);
            info!(username, "SFTP session ended");
        });

        Ok(())
    }
}
