//! Notification fanout for the kennel monitor.
//!
//! - [`Notification`]: the envelope for liveness and range transitions.
//! - [`NotificationFanout`]: in-process publish/subscribe hub with ordered,
//!   isolated per-subscriber delivery.

pub mod fanout;
pub mod notification;

pub use fanout::{
    handler_fn, FnHandler, HandlerError, NotificationFanout, NotificationHandler,
    SubscriptionHandle, QUEUE_DEPTH_WARNING,
};
pub use notification::{Notification, NotificationKind};
