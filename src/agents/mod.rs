//! The three decision agents: Observer, Matcher, Adapter. Each is modeled
//! as a straight-line `(snapshot, externals) -> (events, writes)`
//! operation; the Dispatch Loop (`crate::engine`) is the only place that
//! decides concurrency between them.

pub mod adapter;
pub mod matcher;
pub mod observer;
