//! Custody activity events and the bus that fans them out.
//!
//! Events are published only after the store has committed the mutation they
//! describe, so a subscriber never observes a change that was rolled back.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
