//! Application state and its reducer.
//!
//! `reduce` is pure: it takes the current state by reference and returns the
//! next one. `Store` is the single owner that applies actions in order.

use civicwatch_common::{Notification, Report, User};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    /// Newest first.
    pub reports: Vec<Report>,
    pub user: Option<User>,
    pub notifications: Vec<Notification>,
    /// Set when an action needed a signed-in user and there was none.
    pub auth_prompt_open: bool,
}

impl AppState {
    pub fn report(&self, id: &str) -> Option<&Report> {
        self.reports.iter().find(|r| r.id == id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn unread_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.read).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the whole collection with the remote one.
    ReportsLoaded(Vec<Report>),
    /// Prepend a report (optimistic insert).
    ReportAdded(Report),
    ReportRemoved(String),
    /// Swap the report with the same id; no-op if absent.
    ReportReplaced(Report),
    /// Swap a local-only report for its persisted counterpart.
    ReportPromoted { temp_id: String, report: Report },
    SignedIn(User),
    SignedOut,
    UserUpdated(User),
    Notify(Notification),
    NotificationsRead,
    NotificationsCleared,
    AuthPromptOpened,
    AuthPromptClosed,
}

pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::ReportsLoaded(reports) => next.reports = reports,
        Action::ReportAdded(report) => next.reports.insert(0, report),
        Action::ReportRemoved(id) => next.reports.retain(|r| r.id != id),
        Action::ReportReplaced(report) => {
            if let Some(slot) = next.reports.iter_mut().find(|r| r.id == report.id) {
                *slot = report;
            }
        }
        Action::ReportPromoted { temp_id, report } => {
            match next.reports.iter_mut().find(|r| r.id == temp_id) {
                Some(slot) => *slot = report,
                None => next.reports.insert(0, report),
            }
        }
        Action::SignedIn(user) => {
            next.user = Some(user);
            next.auth_prompt_open = false;
        }
        Action::SignedOut => next.user = None,
        Action::UserUpdated(user) => {
            if next.user.as_ref().is_some_and(|u| u.id == user.id) {
                next.user = Some(user);
            }
        }
        Action::Notify(notification) => next.notifications.insert(0, notification),
        Action::NotificationsRead => {
            for n in &mut next.notifications {
                n.read = true;
            }
        }
        Action::NotificationsCleared => next.notifications.clear(),
        Action::AuthPromptOpened => next.auth_prompt_open = true,
        Action::AuthPromptClosed => next.auth_prompt_open = false,
    }
    next
}

/// Owner of the current `AppState`.
#[derive(Debug, Default)]
pub struct Store {
    state: AppState,
}

impl Store {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        self.state = reduce(&self.state, action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_report, sample_user};
    use civicwatch_common::NotificationKind;

    #[test]
    fn added_reports_go_first() {
        let mut store = Store::default();
        store.dispatch(Action::ReportAdded(sample_report("a")));
        store.dispatch(Action::ReportAdded(sample_report("b")));
        let ids: Vec<&str> = store.state().reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn add_then_remove_restores_state() {
        let mut store = Store::default();
        store.dispatch(Action::ReportsLoaded(vec![sample_report("a")]));
        let before = store.state().clone();

        store.dispatch(Action::ReportAdded(sample_report("temp-1")));
        store.dispatch(Action::ReportRemoved("temp-1".into()));

        assert_eq!(store.state(), &before);
    }

    #[test]
    fn reduce_does_not_touch_input() {
        let state = AppState::default();
        let next = reduce(&state, Action::ReportAdded(sample_report("a")));
        assert!(state.reports.is_empty());
        assert_eq!(next.reports.len(), 1);
    }

    #[test]
    fn replace_missing_report_is_noop() {
        let state = AppState {
            reports: vec![sample_report("a")],
            ..Default::default()
        };
        let next = reduce(&state, Action::ReportReplaced(sample_report("zzz")));
        assert_eq!(next, state);
    }

    #[test]
    fn promote_swaps_temp_entry_in_place() {
        let state = AppState {
            reports: vec![sample_report("temp-1"), sample_report("a")],
            ..Default::default()
        };
        let next = reduce(
            &state,
            Action::ReportPromoted {
                temp_id: "temp-1".into(),
                report: sample_report("p1"),
            },
        );
        let ids: Vec<&str> = next.reports.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "a"]);
    }

    #[test]
    fn sign_in_closes_prompt_and_sign_out_keeps_notifications() {
        let mut store = Store::default();
        store.dispatch(Action::AuthPromptOpened);
        store.dispatch(Action::SignedIn(sample_user("u1")));
        assert!(!store.state().auth_prompt_open);

        store.dispatch(Action::Notify(Notification::new(NotificationKind::Info, "hi")));
        store.dispatch(Action::SignedOut);
        assert!(store.state().user.is_none());
        assert_eq!(store.state().notifications.len(), 1);
    }

    #[test]
    fn user_update_ignored_for_other_user() {
        let mut store = Store::default();
        store.dispatch(Action::SignedIn(sample_user("u1")));
        let mut other = sample_user("u2");
        other.points = 99;
        store.dispatch(Action::UserUpdated(other));
        assert_eq!(store.state().user.as_ref().unwrap().id, "u1");
    }

    #[test]
    fn notifications_persist_until_cleared() {
        let mut store = Store::default();
        for i in 0..120 {
            store.dispatch(Action::Notify(Notification::new(
                NotificationKind::Info,
                format!("n{i}"),
            )));
        }
        assert_eq!(store.state().notifications.len(), 120);
        assert_eq!(store.state().unread_count(), 120);
        assert_eq!(store.state().notifications[0].message, "n119");
        assert_eq!(store.state().notifications[119].message, "n0");

        store.dispatch(Action::NotificationsRead);
        assert_eq!(store.state().unread_count(), 0);

        store.dispatch(Action::NotificationsCleared);
        assert!(store.state().notifications.is_empty());
    }
}
