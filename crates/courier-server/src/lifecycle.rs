//! Per-connection state machine: `Unjoined -> Joined -> Closed`.
//!
//! Every transport connection owns one [`ConnectionLifecycle`]. It turns
//! decoded client events into registry, relay and signaling calls, and on
//! close removes the session and tells any call peer that the call is over.
//! A bad event is logged and dropped; it never closes the connection.

use std::sync::Arc;

use courier_shared::{ClientEvent, ProtocolError, ServerEvent, UserId};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::hub::Hub;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Unjoined,
    Joined(UserId),
    Closed,
}

pub struct ConnectionLifecycle {
    hub: Arc<Hub>,
    conn: Connection,
    phase: Phase,
}

impl ConnectionLifecycle {
    pub fn new(hub: Arc<Hub>, conn: Connection) -> Self {
        debug!(conn = %conn.id(), "Connection opened");
        Self {
            hub,
            conn,
            phase: Phase::Unjoined,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Decode and handle one text frame.
    pub async fn handle_text(&mut self, text: &str) {
        match ClientEvent::from_json(text) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => {
                warn!(conn = %self.conn.id(), error = %e, "Dropping malformed event");
            }
        }
    }

    pub async fn handle_event(&mut self, event: ClientEvent) {
        let name = event.name();
        if let Err(e) = self.dispatch(event).await {
            warn!(conn = %self.conn.id(), event = name, error = %e, "Dropping event");
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), ProtocolError> {
        match event {
            ClientEvent::JoinUser(user) => self.join(user),
            ClientEvent::SendMessage(msg) => {
                let me = self.joined_user()?;
                if msg.sender_id != me {
                    return Err(ProtocolError::SenderMismatch {
                        joined: me.to_string(),
                        claimed: msg.sender_id.to_string(),
                    });
                }
                if let Err(e) = self
                    .hub
                    .relay
                    .relay(&me, &msg.receiver_id, msg.text, msg.reply_to)
                    .await
                {
                    self.conn.push(ServerEvent::MessageError {
                        receiver_id: msg.receiver_id,
                        error: e.client_message(),
                    });
                }
                Ok(())
            }
            ClientEvent::CallUser { to, offer } => {
                let me = self.joined_user()?;
                self.hub.signaling.offer(&me, &self.conn, &to, offer);
                Ok(())
            }
            ClientEvent::AnswerCall { to, answer } => {
                let me = self.joined_user()?;
                self.hub.signaling.answer(&me, &self.conn, &to, answer);
                Ok(())
            }
            ClientEvent::IceCandidate { to, candidate } => {
                let me = self.joined_user()?;
                self.hub.signaling.ice_candidate(&me, &self.conn, &to, candidate);
                Ok(())
            }
            ClientEvent::EndCall { to } => {
                let me = self.joined_user()?;
                self.hub.signaling.end(&me, &self.conn, &to);
                Ok(())
            }
        }
    }

    fn joined_user(&self) -> Result<UserId, ProtocolError> {
        match &self.phase {
            Phase::Joined(user) => Ok(user.clone()),
            Phase::Unjoined | Phase::Closed => Err(ProtocolError::NotJoined),
        }
    }

    fn join(&mut self, user: UserId) -> Result<(), ProtocolError> {
        if user.is_empty() {
            return Err(ProtocolError::EmptyIdentifier("userId"));
        }

        match &self.phase {
            Phase::Closed => return Err(ProtocolError::NotJoined),
            Phase::Joined(previous) if *previous != user => {
                // Same socket, new identity: release the old one first.
                let previous = previous.clone();
                self.release(&previous);
            }
            _ => {}
        }

        self.hub.registry.register(user.clone(), self.conn.clone());
        info!(user = %user, conn = %self.conn.id(), "User joined");
        self.phase = Phase::Joined(user);
        Ok(())
    }

    /// Transport-level disconnect. Idempotent.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Joined(user) => {
                self.release(&user);
                info!(user = %user, conn = %self.conn.id(), "User disconnected");
            }
            Phase::Unjoined => {
                debug!(conn = %self.conn.id(), "Connection closed before join");
            }
            Phase::Closed => {}
        }
    }

    fn release(&self, user: &UserId) {
        if self.hub.registry.remove_if_current(user, self.conn.id()) {
            self.hub.relay.forget_sender(user);
        }

        for peer in self.conn.take_call_peers() {
            let Some(peer_conn) = self.hub.registry.lookup(&peer) else {
                continue;
            };
            peer_conn.forget_call_peer(user);
            if peer_conn.push(ServerEvent::CallEnded {
                user_id: Some(user.clone()),
            }) {
                info!(user = %user, peer = %peer, "Notified call peer of disconnect");
            }
        }
    }
}

impl Drop for ConnectionLifecycle {
    fn drop(&mut self) {
        self.close();
    }
}
