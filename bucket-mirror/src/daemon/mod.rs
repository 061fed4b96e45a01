//! Process lifecycle: startup ordering, signal handling and graceful drain.

pub mod lifecycle;
pub mod shutdown;

pub use lifecycle::{Mirror, RunReport};
pub use shutdown::ShutdownSignal;
