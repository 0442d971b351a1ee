use std::sync::atomic::{AtomicBool, Ordering};

/// Marks an encoder or decoder as busy with one top-level call.
///
/// Acquisition fails while another call is in flight; the caller then works
/// on a scratch instance instead of touching the shared buffer.
pub(crate) struct Entered<'a>(&'a AtomicBool);

impl<'a> Entered<'a> {
    pub(crate) fn try_enter(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
