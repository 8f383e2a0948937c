//! Event fan-out to subscribed addresses.

pub mod broadcaster;
pub mod bus;

pub use broadcaster::{Broadcaster, SigningEvent};
pub use bus::{DEFAULT_TOPIC_CAPACITY, EventBus, Subscription};
