use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::date::CalendarDate;
use crate::domain::UserId;
use crate::flows::ScheduleState;

/// One user's in-progress date selection while chat controls are live.
///
/// Ephemeral and in-memory only: a process restart loses every in-flight
/// selection and the user simply restarts the command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingSelection {
    pub state: ScheduleState,
    pub start_date: Option<CalendarDate>,
    pub end_date: Option<CalendarDate>,
}

impl PendingSelection {
    fn new() -> Self {
        Self { state: ScheduleState::AwaitingStart, start_date: None, end_date: None }
    }
}

#[derive(Debug)]
struct Entry {
    selection: PendingSelection,
    touched_at: Instant,
}

/// Process-wide keyed store of in-progress selections.
///
/// At most one entry per user; a second `begin` overwrites the prior entry
/// (last write wins, no merge). Operations on a single key appear atomic;
/// readers of unrelated keys do not block each other.
#[derive(Debug, Default)]
pub struct PendingSelectionStore {
    entries: RwLock<HashMap<UserId, Entry>>,
}

impl PendingSelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) a selection in `AwaitingStart` with no dates.
    pub fn begin(&self, user_id: &UserId) {
        let mut entries = self.write();
        entries.insert(
            user_id.clone(),
            Entry { selection: PendingSelection::new(), touched_at: Instant::now() },
        );
    }

    pub fn set_start_date(&self, user_id: &UserId, date: CalendarDate) {
        self.mutate(user_id, |selection| selection.start_date = Some(date));
    }

    pub fn set_end_date(&self, user_id: &UserId, date: CalendarDate) {
        self.mutate(user_id, |selection| selection.end_date = Some(date));
    }

    /// Moves the entry to `AwaitingEnd`, preserving any captured start date.
    pub fn advance(&self, user_id: &UserId) {
        self.mutate(user_id, |selection| selection.state = ScheduleState::AwaitingEnd);
    }

    pub fn get(&self, user_id: &UserId) -> Option<PendingSelection> {
        self.read().get(user_id).map(|entry| entry.selection.clone())
    }

    /// The flow state implied by the store: no entry means `Idle`.
    pub fn state_of(&self, user_id: &UserId) -> ScheduleState {
        self.read()
            .get(user_id)
            .map(|entry| entry.selection.state.clone())
            .unwrap_or(ScheduleState::Idle)
    }

    /// Idempotent removal; a no-op on an absent key, never fails.
    pub fn clear(&self, user_id: &UserId) {
        self.write().remove(user_id);
    }

    /// Drops entries untouched for longer than `max_age` and returns their
    /// ids. Abandoned flows are never cancelled by the user, so this is the
    /// only thing that reclaims them.
    pub fn evict_stale(&self, max_age: Duration) -> Vec<UserId> {
        let mut entries = self.write();
        let now = Instant::now();
        let stale: Vec<UserId> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.touched_at) > max_age)
            .map(|(user_id, _)| user_id.clone())
            .collect();
        for user_id in &stale {
            entries.remove(user_id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn mutate(&self, user_id: &UserId, apply: impl FnOnce(&mut PendingSelection)) {
        let mut entries = self.write();
        let entry = entries
            .entry(user_id.clone())
            .or_insert_with(|| Entry { selection: PendingSelection::new(), touched_at: Instant::now() });
        apply(&mut entry.selection);
        entry.touched_at = Instant::now();
    }

    // Entries are plain data, so a poisoned lock holds nothing worse than a
    // half-touched timestamp; recover instead of propagating the panic.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::date::CalendarDate;
    use crate::domain::UserId;
    use crate::flows::ScheduleState;

    use super::PendingSelectionStore;

    fn user(id: &str) -> UserId {
        UserId(id.to_owned())
    }

    #[test]
    fn begin_creates_an_empty_awaiting_start_entry() {
        let store = PendingSelectionStore::new();
        store.begin(&user("U1"));

        let selection = store.get(&user("U1")).expect("entry exists");
        assert_eq!(selection.state, ScheduleState::AwaitingStart);
        assert!(selection.start_date.is_none());
        assert!(selection.end_date.is_none());
    }

    #[test]
    fn begin_overwrites_a_prior_selection() {
        let store = PendingSelectionStore::new();
        store.begin(&user("U1"));
        store.set_start_date(&user("U1"), CalendarDate::parse("2024-03-01").expect("valid"));
        store.advance(&user("U1"));

        store.begin(&user("U1"));
        let selection = store.get(&user("U1")).expect("entry exists");
        assert_eq!(selection.state, ScheduleState::AwaitingStart);
        assert!(selection.start_date.is_none(), "restart must not merge prior dates");
    }

    #[test]
    fn set_operations_create_the_entry_when_absent() {
        let store = PendingSelectionStore::new();
        store.set_end_date(&user("U2"), CalendarDate::parse("2024-03-10").expect("valid"));

        let selection = store.get(&user("U2")).expect("entry created implicitly");
        assert_eq!(
            selection.end_date,
            Some(CalendarDate::parse("2024-03-10").expect("valid"))
        );
    }

    #[test]
    fn advance_preserves_the_captured_start_date() {
        let store = PendingSelectionStore::new();
        let start = CalendarDate::parse("2024-03-01").expect("valid");
        store.begin(&user("U1"));
        store.set_start_date(&user("U1"), start.clone());
        store.advance(&user("U1"));

        let selection = store.get(&user("U1")).expect("entry exists");
        assert_eq!(selection.state, ScheduleState::AwaitingEnd);
        assert_eq!(selection.start_date, Some(start));
    }

    #[test]
    fn clear_is_idempotent_and_never_fails_on_absent_keys() {
        let store = PendingSelectionStore::new();
        store.clear(&user("nobody"));
        store.begin(&user("U1"));
        store.clear(&user("U1"));
        store.clear(&user("U1"));
        assert!(store.get(&user("U1")).is_none());
    }

    #[test]
    fn state_of_reports_idle_for_unknown_users() {
        let store = PendingSelectionStore::new();
        assert_eq!(store.state_of(&user("U9")), ScheduleState::Idle);
    }

    #[test]
    fn abandoned_entries_linger_until_eviction() {
        let store = PendingSelectionStore::new();
        store.begin(&user("U1"));

        // The user walks away: nothing cleans the entry up on its own.
        assert_eq!(store.len(), 1);

        let evicted = store.evict_stale(Duration::ZERO);
        assert_eq!(evicted, vec![user("U1")]);
        assert!(store.is_empty());
    }

    #[test]
    fn eviction_spares_recently_touched_entries() {
        let store = PendingSelectionStore::new();
        store.begin(&user("U1"));

        let evicted = store.evict_stale(Duration::from_secs(3600));
        assert!(evicted.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn keys_are_independent() {
        let store = PendingSelectionStore::new();
        store.begin(&user("U1"));
        store.begin(&user("U2"));
        store.clear(&user("U1"));

        assert!(store.get(&user("U1")).is_none());
        assert!(store.get(&user("U2")).is_some());
    }
}
