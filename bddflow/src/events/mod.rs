//! Event sinks for stage and run transitions.
//!
//! The runner emits one [`PipelineEvent`](crate::core::PipelineEvent) per
//! transition. Sinks decide what to do with it: log it, collect it for tests,
//! or forward it to a progress reporter.

mod sink;

pub use sink::{
    ChannelEventSink, CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
};
