//! Epoch tags for generations of finalization work.

/// Identifier for one generation of finalization obligations.
///
/// Every collection cycle that hands work to the finalizer processor tags it
/// with an epoch. Epochs are expected to be monotonically increasing per
/// processor instance. The value `0` is reserved: it is the seed the worker
/// compares its first wakeup against, so a user-assigned epoch of `0` would
/// be indistinguishable from "no work completed yet".
///
/// # Example
///
/// ```
/// use loam_finalizer::Epoch;
///
/// let epoch = Epoch(7);
/// assert_eq!(epoch.get(), 7);
/// assert!(epoch > Epoch::ZERO);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub i64);

impl Epoch {
    /// The reserved zero epoch. Never assign it to real work.
    pub const ZERO: Self = Self(0);

    /// Raw epoch value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Epoch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Completion callback invoked with the epoch of each finished processing
/// step.
///
/// The callback may run on the worker thread or, for the empty-batch fast
/// path, synchronously on the scheduling thread. Callers must treat it as
/// asynchronous with respect to [`schedule`] returning and must not assume a
/// particular thread identity. Epoch values passed to it are non-decreasing.
///
/// [`schedule`]: crate::FinalizerProcessor::schedule
pub type EpochDoneCallback = Box<dyn Fn(Epoch) + Send + Sync>;
