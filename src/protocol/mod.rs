//! Threshold DKG Protocol
//!
//! - **commitment**: Feldman and Pedersen VSS commitments and share checks
//! - **kosk**: proofs of knowledge of each party's secret contribution
//! - **transport**: in-process peer messaging
//! - **party**: one party's round state machine
//! - **dkg**: lock-step orchestration, abort handling and proactive refresh

pub mod commitment;
pub mod dkg;
pub mod kosk;
pub mod party;
pub mod transport;

pub use commitment::{CommitmentScheme, SchemeKind, ShareEvaluation};
pub use dkg::Dkg;
pub use party::{Party, PartyState, PeerRecord};
pub use transport::{ChannelEndpoint, Envelope, MessageTap, Payload, Transport};
