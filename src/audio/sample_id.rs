use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Handle for a buffer registered with the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampleId(pub u64);

impl SampleId {
    // unique across loader threads
    pub fn next() -> Self {
        SampleId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}
