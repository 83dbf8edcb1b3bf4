//! Subscription Hub (spec §4.E): the WebSocket publish/subscribe
//! subsystem, grounded on `warp::ws` and the reference node's `rpc_server.rs`
//! accept-loop idiom.

pub mod event_loop;
pub mod filter;
pub mod subscriber;
pub mod ws;

pub use event_loop::SubscriptionHub;
pub use subscriber::Subscriber;
