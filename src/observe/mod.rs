// # Observe Module
//
// Live query scopes over the reader context. An observer materializes its
// scope once, then turns every committed batch into an ordered list diff
// (insert/delete/move/update with positions) so the consumer can animate
// collection changes instead of reloading.
//
// - **diff**: keyed ordered-set diff between two materializations
// - **observer**: per-scope state machine driven by commit announcements

mod diff;
mod observer;

pub use diff::{diff_ordered, ChangeOp, RowChange};
pub use observer::{ChangeBatch, ChangeObserver, ObserverHandle, ObserverState, QueryScope};
