// Copyright 2025 Cowboy AI, LLC.

//! Aggregate roots with identity and optimistic versioning

/// An aggregate whose writes are guarded by a version number
///
/// The store compares the version read before a transition with the one it
/// holds and refuses the write when they differ. Mutators go through the
/// root and the caller bumps the version once per committed transition.
///
/// ```rust
/// use opex_workflow::AggregateRoot;
///
/// struct SavingsLedger {
///     site: &'static str,
///     revision: u64,
///     booked_minor: i64,
/// }
///
/// impl AggregateRoot for SavingsLedger {
///     type Id = &'static str;
///
///     fn id(&self) -> Self::Id {
///         self.site
///     }
///
///     fn version(&self) -> u64 {
///         self.revision
///     }
///
///     fn increment_version(&mut self) {
///         self.revision += 1;
///     }
/// }
///
/// let mut ledger = SavingsLedger { site: "NDS", revision: 4, booked_minor: 0 };
/// let read_at = ledger.version();
/// ledger.booked_minor += 125_000;
/// ledger.increment_version();
/// assert_eq!(ledger.version(), read_at + 1);
/// assert_eq!(ledger.id(), "NDS");
/// ```
pub trait AggregateRoot: Sized {
    /// Identifier type
    type Id: Copy + Eq + Send + Sync;

    /// Identity of this aggregate
    fn id(&self) -> Self::Id;

    /// Version last committed or loaded
    fn version(&self) -> u64;

    /// Bump the version after a transition
    fn increment_version(&mut self);
}
