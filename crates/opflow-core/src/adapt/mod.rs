//! Adaptors over the completion protocol
//!
//! Each adaptor consumes its input senders and returns a new lazy
//! sender. Channels not selected by an adaptor pass through untouched,
//! and the receiver environment (stop token) is forwarded through
//! every wrapper, so a stop requested by the final consumer reaches the
//! most recently started child.

mod boxed;
mod consume;
mod just;
mod let_chan;
mod on;
mod then;
mod when_all;

pub use boxed::{box_sender, BoxSender};
pub use consume::{start_detached, sync_wait};
pub use just::{just, just_error, just_stopped, Just, JustError, JustStopped};
pub use let_chan::{let_error, let_stopped, let_value, LetError, LetStopped, LetValue};
pub use on::{on, transfer, transfer_just, On};
pub use then::{then, Then};
pub use when_all::{when_all, when_all3, WhenAll};

use std::any::Any;

/// Render a panic payload into a printable message
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
