//! Change events emitted after every committed mutation.
//!
//! - `event.rs` - the `{operation, data}` envelope
//! - `transport.rs` - publish/subscribe seam and an in-process topic broker
//! - `outbox.rs` - ordered outbox that retries delivery until it succeeds

mod event;
mod outbox;
mod transport;

pub use event::{ChangeEvent, Operation};
pub use outbox::{ChangeEventEmitter, EmitOutcome, OutboxRecord};
pub use transport::{Delivery, EventTransport, InMemoryBroker, Subscription, TransportError};
