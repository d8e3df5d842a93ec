//! Delivery of folder content: streaming, cancellation, self-destruct
//! timers and the redemption ledger.

pub mod cancel;
pub mod engine;
pub mod ledger;
pub mod self_destruct;
pub mod sender;

pub use cancel::CancelRegistry;
pub use engine::{DeliveryEngine, DeliveryResult, Recipient};
pub use self_destruct::SelfDestructQueue;
pub use sender::{ContentSender, MessageHandle};
