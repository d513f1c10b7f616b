//! Runtime core of Switchboard.
//!
//! This crate defines the "ports" (the `Bus`, `Reactor`, and gateway
//! transport traits) together with the logic that needs no network I/O:
//! events and their fallback contract, the event hub, the gateway session
//! state machine, the built-in reactors, and the component registry.
//! Concrete transports live in `switchboard-infra`.

pub mod bus;
pub mod event;
pub mod gateway;
pub mod hub;
pub mod reactor;
pub mod registry;
