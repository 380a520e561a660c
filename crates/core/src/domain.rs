use serde::{Deserialize, Serialize};

use crate::date::CalendarDate;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One persisted on-call entry per user, upsert semantics only.
///
/// Both dates `None` means "not currently scheduled" — a valid, queryable
/// state that is distinct from the record being absent entirely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnCallRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub start_date: Option<CalendarDate>,
    pub end_date: Option<CalendarDate>,
}

impl OnCallRecord {
    pub fn scheduled(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        start_date: CalendarDate,
        end_date: CalendarDate,
    ) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            display_name: display_name.into(),
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }

    pub fn unscheduled(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            display_name: display_name.into(),
            start_date: None,
            end_date: None,
        }
    }

    /// Whether the record carries a complete, displayable range: both dates
    /// present, each with all three segments intact.
    pub fn is_scheduled(&self) -> bool {
        let complete =
            |date: &CalendarDate| date.segments().iter().all(|segment| !segment.is_empty());
        matches!(
            (&self.start_date, &self.end_date),
            (Some(start), Some(end)) if complete(start) && complete(end)
        )
    }
}
