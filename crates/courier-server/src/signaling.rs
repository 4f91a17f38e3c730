//! Call signaling router.
//!
//! Offers, answers, ICE candidates and hangups are forwarded to the target
//! user's current connection and otherwise dropped. The relay keeps no call
//! phase of its own; the two peer connections own that. The only thing
//! recorded here is who is in signaling with whom, on the connection
//! handles themselves, so a disconnect can tell the other side.
//!
//! Hangups are not deduplicated: two `end-call`s produce two `call-ended`
//! pushes.

use courier_shared::{ServerEvent, UserId};
use serde_json::Value;
use tracing::debug;

use crate::connection::Connection;
use crate::registry::SessionRegistry;

/// One step of the offer/answer/ICE/hangup exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
    End,
}

impl Signal {
    fn name(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::IceCandidate(_) => "ice-candidate",
            Signal::End => "end",
        }
    }
}

#[derive(Clone)]
pub struct CallSignaling {
    registry: SessionRegistry,
}

impl CallSignaling {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Forward `signal` from `from` (speaking on `origin`) to `to`.
    ///
    /// Returns whether the push was queued. An unreachable target is a
    /// silent drop; callers are expected to time out on their own.
    pub fn route(&self, from: &UserId, origin: &Connection, to: &UserId, signal: Signal) -> bool {
        let kind = signal.name();
        let pairs = matches!(signal, Signal::Offer(_) | Signal::Answer(_));
        let hangup = matches!(signal, Signal::End);

        if hangup {
            origin.forget_call_peer(to);
        }

        let Some(target) = self.registry.lookup(to) else {
            debug!(
                from = %from.short(),
                to = %to.short(),
                signal = kind,
                "Signal target unreachable, dropping"
            );
            return false;
        };

        let sender = from.clone();
        let event = match signal {
            Signal::Offer(offer) => ServerEvent::IncomingCall { from: sender, offer },
            Signal::Answer(answer) => ServerEvent::CallAnswered {
                from: sender,
                answer,
            },
            Signal::IceCandidate(candidate) => ServerEvent::IceCandidate {
                from: sender,
                candidate,
            },
            Signal::End => ServerEvent::CallEnded {
                user_id: Some(sender),
            },
        };

        let delivered = target.push(event);

        // Only a peer that actually saw the offer or answer counts as in a call.
        if hangup {
            target.forget_call_peer(from);
        } else if pairs && delivered {
            origin.note_call_peer(to);
            target.note_call_peer(from);
        }

        debug!(to = %to.short(), signal = kind, delivered, "Signal routed");
        delivered
    }

    pub fn offer(&self, from: &UserId, origin: &Connection, to: &UserId, offer: Value) -> bool {
        self.route(from, origin, to, Signal::Offer(offer))
    }

    pub fn answer(&self, from: &UserId, origin: &Connection, to: &UserId, answer: Value) -> bool {
        self.route(from, origin, to, Signal::Answer(answer))
    }

    pub fn ice_candidate(
        &self,
        from: &UserId,
        origin: &Connection,
        to: &UserId,
        candidate: Value,
    ) -> bool {
        self.route(from, origin, to, Signal::IceCandidate(candidate))
    }

    pub fn end(&self, from: &UserId, origin: &Connection, to: &UserId) -> bool {
        self.route(from, origin, to, Signal::End)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::connection::EventReceiver;

    fn join(registry: &SessionRegistry, id: &str) -> (UserId, Connection, EventReceiver) {
        let (conn, rx) = Connection::channel();
        let user = UserId::from(id);
        registry.register(user.clone(), conn.clone());
        (user, conn, rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_offer_to_unregistered_user_is_dropped() {
        let registry = SessionRegistry::new();
        let signaling = CallSignaling::new(registry.clone());
        let (alice, alice_conn, mut rx_a) = join(&registry, "alice");

        let delivered = signaling.offer(&alice, &alice_conn, &"bob".into(), json!({"sdp": "x"}));

        assert!(!delivered);
        assert!(drain(&mut rx_a).is_empty());
        assert!(!alice_conn.in_call_with(&"bob".into()));
    }

    #[test]
    fn test_offer_to_closed_connection_records_no_peer() {
        let registry = SessionRegistry::new();
        let signaling = CallSignaling::new(registry.clone());
        let (alice, alice_conn, _rx_a) = join(&registry, "alice");
        let (bob, bob_conn, rx_b) = join(&registry, "bob");
        drop(rx_b);

        assert!(!signaling.offer(&alice, &alice_conn, &bob, json!({})));
        assert!(!alice_conn.in_call_with(&bob));
        assert!(!bob_conn.in_call_with(&alice));
    }

    #[test]
    fn test_full_exchange_reaches_the_right_side_in_order() {
        let registry = SessionRegistry::new();
        let signaling = CallSignaling::new(registry.clone());
        let (alice, alice_conn, mut rx_a) = join(&registry, "alice");
        let (bob, bob_conn, mut rx_b) = join(&registry, "bob");

        assert!(signaling.offer(&alice, &alice_conn, &bob, json!({"type": "offer"})));
        assert!(signaling.answer(&bob, &bob_conn, &alice, json!({"type": "answer"})));
        assert!(signaling.ice_candidate(&alice, &alice_conn, &bob, json!({"candidate": "c1"})));
        assert!(signaling.end(&bob, &bob_conn, &alice));

        assert_eq!(
            drain(&mut rx_b),
            vec![
                ServerEvent::IncomingCall {
                    from: alice.clone(),
                    offer: json!({"type": "offer"}),
                },
                ServerEvent::IceCandidate {
                    from: alice.clone(),
                    candidate: json!({"candidate": "c1"}),
                },
            ]
        );
        assert_eq!(
            drain(&mut rx_a),
            vec![
                ServerEvent::CallAnswered {
                    from: bob.clone(),
                    answer: json!({"type": "answer"}),
                },
                ServerEvent::CallEnded {
                    user_id: Some(bob.clone()),
                },
            ]
        );

        // Hangup clears the pairing on both sides.
        assert!(!alice_conn.in_call_with(&bob));
        assert!(!bob_conn.in_call_with(&alice));
    }

    #[test]
    fn test_offer_records_call_peers_on_both_connections() {
        let registry = SessionRegistry::new();
        let signaling = CallSignaling::new(registry.clone());
        let (alice, alice_conn, _rx_a) = join(&registry, "alice");
        let (bob, bob_conn, _rx_b) = join(&registry, "bob");

        signaling.offer(&alice, &alice_conn, &bob, json!({}));

        assert!(alice_conn.in_call_with(&bob));
        assert!(bob_conn.in_call_with(&alice));
    }

    #[test]
    fn test_ice_candidate_does_not_start_a_call() {
        let registry = SessionRegistry::new();
        let signaling = CallSignaling::new(registry.clone());
        let (alice, alice_conn, _rx_a) = join(&registry, "alice");
        let (bob, bob_conn, mut rx_b) = join(&registry, "bob");

        assert!(signaling.ice_candidate(&alice, &alice_conn, &bob, json!("early")));

        assert_eq!(drain(&mut rx_b).len(), 1);
        assert!(!alice_conn.in_call_with(&bob));
        assert!(!bob_conn.in_call_with(&alice));
    }

    #[test]
    fn test_end_call_is_not_deduplicated() {
        let registry = SessionRegistry::new();
        let signaling = CallSignaling::new(registry.clone());
        let (alice, alice_conn, _rx_a) = join(&registry, "alice");
        let (bob, _bob_conn, mut rx_b) = join(&registry, "bob");

        assert!(signaling.end(&alice, &alice_conn, &bob));
        assert!(signaling.end(&alice, &alice_conn, &bob));

        let ended = ServerEvent::CallEnded {
            user_id: Some(alice.clone()),
        };
        assert_eq!(drain(&mut rx_b), vec![ended.clone(), ended]);
    }

    #[test]
    fn test_second_offer_supersedes_first() {
        let registry = SessionRegistry::new();
        let signaling = CallSignaling::new(registry.clone());
        let (alice, alice_conn, _rx_a) = join(&registry, "alice");
        let (bob, _bob_conn, mut rx_b) = join(&registry, "bob");

        signaling.offer(&alice, &alice_conn, &bob, json!({"sdp": "first"}));
        signaling.offer(&alice, &alice_conn, &bob, json!({"sdp": "second"}));

        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ServerEvent::IncomingCall {
                from: alice,
                offer: json!({"sdp": "second"}),
            }
        );
    }
}
