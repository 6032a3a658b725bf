use arrayvec::ArrayString;
use dashmap::DashSet;
use std::sync::LazyLock;

// ────────────────────────────────────────────────────────────────
// ProcessingGuard - Prevents the same pipeline instance being driven twice
// ────────────────────────────────────────────────────────────────

static IN_PROGRESS: LazyLock<DashSet<ArrayString<64>>> = LazyLock::new(DashSet::new);

pub struct ProcessingGuard(ArrayString<64>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        IN_PROGRESS.remove(&self.0);
    }
}

pub fn try_acquire(id: impl AsRef<str>) -> Option<ProcessingGuard> {
    let id = ArrayString::from(id.as_ref()).ok()?;
    if IN_PROGRESS.insert(id) {
        Some(ProcessingGuard(id))
    } else {
        None
    }
}
