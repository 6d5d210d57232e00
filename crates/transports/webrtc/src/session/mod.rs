//! Session registry, candidate mailbox and per-session connection events

mod events;
mod registry;

pub use events::SessionEvent;
pub use registry::SessionRegistry;

pub(crate) use events::spawn_event_loop;
