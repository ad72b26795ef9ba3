mod store;
#[cfg(feature = "tracing")]
mod trace;

pub(crate) use self::store::MemoryStore;
#[cfg(feature = "tracing")]
pub(crate) use self::trace::{TracingEventValue, TracingHandler};
