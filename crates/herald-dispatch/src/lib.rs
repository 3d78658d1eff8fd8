//! `herald-dispatch` — consumer side of the pipeline.
//!
//! A [`Consumer`] subscribes to the delivery queue, decodes each task envelope
//! and passes the task to the [`Dispatcher`], which runs the handler
//! registered for its kind. Built-in handlers act through a [`ChatClient`]:
//!
//! | Kind                              | Action                                   |
//! |-----------------------------------|------------------------------------------|
//! | `reminder`                        | message the destination                  |
//! | `ban-removal` / `mute-removal`    | unban / unmute                           |
//! | `notify-voice-requests`           | list waiting nicks in the channel        |
//! | `persistent-channel`              | join                                     |
//! | `reconnect`                       | reconnect to the network                 |
//! | `disinfo-ban-removal` / `-mute-`  | lift the penalty, then notify the nick   |
//!
//! Nothing a handler does affects acknowledgement: failures are logged and
//! the message is dropped.

pub mod chat;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod humanize;
pub mod types;

pub use chat::{ChatClient, HttpChatBridge, LogChat};
pub use consumer::{Consumer, Outcome};
pub use dispatcher::Dispatcher;
pub use error::{ChatError, DispatchError, Result};
pub use handlers::TaskHandler;
pub use types::ChatAction;
