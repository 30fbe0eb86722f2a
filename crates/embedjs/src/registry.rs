//! Process-wide complex-object sentinel

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Stand-in for a script value with no host representation.
///
/// There is one live identity per process. Clones compare equal to each
/// other and to every later [`ComplexObject::instance`] call until
/// [`ComplexObject::reset`] drops it.
#[derive(Clone)]
pub struct ComplexObject(Arc<Sentinel>);

struct Sentinel {
    generation: u64,
}

static INSTANCE: Mutex<Option<ComplexObject>> = Mutex::new(None);
static GENERATION: AtomicU64 = AtomicU64::new(0);

impl ComplexObject {
    /// The process-wide sentinel, created on first use.
    pub fn instance() -> Self {
        let mut slot = INSTANCE.lock();
        slot.get_or_insert_with(|| {
            let generation = GENERATION.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(generation, "initialised complex object sentinel");
            Self(Arc::new(Sentinel { generation }))
        })
        .clone()
    }

    /// Forget the current sentinel. The next [`instance`](Self::instance)
    /// call builds a new identity; values handed out earlier keep the old
    /// one.
    pub fn reset() {
        if INSTANCE.lock().take().is_some() {
            tracing::debug!("complex object sentinel reset");
        }
    }
}

impl PartialEq for ComplexObject {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ComplexObject {}

impl fmt::Debug for ComplexObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComplexObject(#{})", self.0.generation)
    }
}
