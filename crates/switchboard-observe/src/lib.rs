//! Observability setup for Switchboard: log filter resolution and the
//! global tracing subscriber.

pub mod tracing_setup;
