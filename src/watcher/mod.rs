//! File watching for hot reload
//!
//! - `service`: directory subtree → debounced raw events (`notify` backed)
//! - `pipeline`: raw events → registry updates and change events
//! - `event`: raw and public event types, the change stream

mod event;
mod pipeline;
mod service;

pub use event::{
    ChangeEvent, ChangeListener, ChangeStream, RawEvent, RawEventKind, SubscriberId, DEBOUNCE_MS,
};
pub use pipeline::{DirState, WatchPipeline};
pub use service::{NotifyWatchService, WatchMessage, WatchService, WatchSubscription};
