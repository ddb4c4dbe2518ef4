// Discord transport seam: interaction payloads, outbound REST and signatures.

pub mod model;
pub mod rest;
pub mod verify;

pub use model::{
    parse_interaction, Actor, Choice, EventContext, InboundEvent, Interaction, Reply, Resolved,
};
pub use rest::{Messenger, RestError, RestMessenger};
