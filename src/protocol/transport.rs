//! Peer Messaging
//!
//! Parties never hold references to each other. Each one gets a [`Transport`]
//! that can broadcast to every connected peer, send to exactly one, and drain
//! whatever arrived. The in-process [`ChannelEndpoint`] is a fully connected
//! graph of `mpsc` channels; delivery is synchronous with no loss or
//! reordering, and the sender id is stamped by the endpoint, not the caller.

use super::commitment::ShareEvaluation;
use super::kosk::KoskProof;
use crate::crypto::curve::GroupPoint;
use crate::error::DkgError;
use std::collections::BTreeMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Kosk(KoskProof),
    /// Scheme commitments, broadcast
    Commitments(Vec<GroupPoint>),
    /// `fᵢ·G`, broadcast alongside Pedersen commitments
    MaskedCoefficients(Vec<GroupPoint>),
    /// Point-to-point only
    Evaluation(ShareEvaluation),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Kosk(_) => "kosk",
            Payload::Commitments(_) => "commitments",
            Payload::MaskedCoefficients(_) => "masked coefficients",
            Payload::Evaluation(_) => "evaluation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub from: u32,
    pub to: u32,
    pub payload: Payload,
}

/// Hook that may rewrite envelopes in flight (fault injection).
pub type MessageTap = Arc<dyn Fn(&mut Envelope) + Send + Sync>;

pub trait Transport: Send {
    /// Id of the party this transport belongs to.
    fn id(&self) -> u32;

    /// Ids of all connected peers, ascending.
    fn peers(&self) -> Vec<u32>;

    fn broadcast(&self, payload: Payload) -> Result<(), DkgError>;

    fn send(&self, to: u32, payload: Payload) -> Result<(), DkgError>;

    /// Drain everything delivered so far.
    fn receive(&self) -> Vec<Envelope>;
}

pub struct ChannelEndpoint {
    id: u32,
    inbox: Receiver<Envelope>,
    inbox_handle: Sender<Envelope>,
    outboxes: BTreeMap<u32, Sender<Envelope>>,
    tap: Option<MessageTap>,
}

impl ChannelEndpoint {
    pub fn new(id: u32) -> Self {
        let (inbox_handle, inbox) = channel();
        Self {
            id,
            inbox,
            inbox_handle,
            outboxes: BTreeMap::new(),
            tap: None,
        }
    }

    pub fn with_tap(mut self, tap: Option<MessageTap>) -> Self {
        self.tap = tap;
        self
    }

    /// Register delivery handles in both directions.
    pub fn connect(&mut self, other: &mut ChannelEndpoint) {
        if self.id == other.id {
            return;
        }
        self.outboxes.insert(other.id, other.inbox_handle.clone());
        other.outboxes.insert(self.id, self.inbox_handle.clone());
    }

    /// Build `n` endpoints with ids `1..=n`, every pair connected.
    pub fn fully_connected(n: u32, tap: Option<MessageTap>) -> Vec<ChannelEndpoint> {
        let mut endpoints: Vec<ChannelEndpoint> = (1..=n)
            .map(|id| ChannelEndpoint::new(id).with_tap(tap.clone()))
            .collect();

        for i in 0..endpoints.len() {
            let (head, tail) = endpoints.split_at_mut(i + 1);
            let current = &mut head[i];
            for other in tail.iter_mut() {
                current.connect(other);
            }
        }

        endpoints
    }

    fn deliver(&self, outbox: &Sender<Envelope>, to: u32, payload: Payload) -> Result<(), DkgError> {
        let mut envelope = Envelope {
            from: self.id,
            to,
            payload,
        };
        if let Some(tap) = &self.tap {
            tap(&mut envelope);
        }

        outbox.send(envelope).map_err(|_| DkgError::MissingData {
            party: self.id,
            peer: to,
            what: "delivery channel",
        })
    }
}

impl Transport for ChannelEndpoint {
    fn id(&self) -> u32 {
        self.id
    }

    fn peers(&self) -> Vec<u32> {
        self.outboxes.keys().copied().collect()
    }

    fn broadcast(&self, payload: Payload) -> Result<(), DkgError> {
        for (&to, outbox) in &self.outboxes {
            self.deliver(outbox, to, payload.clone())?;
        }
        Ok(())
    }

    fn send(&self, to: u32, payload: Payload) -> Result<(), DkgError> {
        let outbox = self.outboxes.get(&to).ok_or(DkgError::MissingData {
            party: self.id,
            peer: to,
            what: "delivery channel",
        })?;
        self.deliver(outbox, to, payload)
    }

    fn receive(&self) -> Vec<Envelope> {
        self.inbox.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::curve::identity;
    use secp256kfun::prelude::*;

    fn evaluation(x: u32) -> Payload {
        Payload::Evaluation(ShareEvaluation {
            x,
            y: Scalar::from(x),
            y_masking: None,
        })
    }

    #[test]
    fn test_fully_connected() {
        let endpoints = ChannelEndpoint::fully_connected(4, None);
        assert_eq!(endpoints.len(), 4);
        assert_eq!(endpoints[0].peers(), vec![2, 3, 4]);
        assert_eq!(endpoints[2].peers(), vec![1, 2, 4]);
    }

    #[test]
    fn test_broadcast_reaches_every_peer_but_self() {
        let endpoints = ChannelEndpoint::fully_connected(3, None);
        endpoints[0]
            .broadcast(Payload::Commitments(vec![identity()]))
            .unwrap();

        assert!(endpoints[0].receive().is_empty());
        for endpoint in &endpoints[1..] {
            let received = endpoint.receive();
            assert_eq!(received.len(), 1);
            assert_eq!(received[0].from, 1);
            assert_eq!(received[0].to, endpoint.id());
        }
    }

    #[test]
    fn test_send_reaches_exactly_one() {
        let endpoints = ChannelEndpoint::fully_connected(3, None);
        endpoints[1].send(3, evaluation(3)).unwrap();

        assert!(endpoints[0].receive().is_empty());
        let received = endpoints[2].receive();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].from, 2);
        assert_eq!(received[0].payload, evaluation(3));
    }

    #[test]
    fn test_send_to_unknown_peer() {
        let endpoints = ChannelEndpoint::fully_connected(2, None);
        assert_eq!(
            endpoints[0].send(9, evaluation(9)),
            Err(DkgError::MissingData {
                party: 1,
                peer: 9,
                what: "delivery channel",
            })
        );
    }

    #[test]
    fn test_tap_rewrites_in_flight() {
        let tap: MessageTap = Arc::new(|envelope: &mut Envelope| {
            if envelope.to == 2 {
                envelope.payload = Payload::Commitments(Vec::new());
            }
        });
        let endpoints = ChannelEndpoint::fully_connected(3, Some(tap));
        endpoints[0]
            .broadcast(Payload::Commitments(vec![identity()]))
            .unwrap();

        assert_eq!(
            endpoints[1].receive()[0].payload,
            Payload::Commitments(Vec::new())
        );
        assert_eq!(
            endpoints[2].receive()[0].payload,
            Payload::Commitments(vec![identity()])
        );
    }
}
