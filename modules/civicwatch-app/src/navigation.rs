//! View switching with a back-stack and fragment deep links.
//!
//! Routing rules live in one table (`ROUTES`) instead of inline conditionals:
//! - `deep_link`: restorable from the URL fragment on initial load
//! - `pre_auth`: landing pages that redirect to the dashboard after sign-in
//! - `requires_auth`: never shown to a signed-out user
//!
//! Only the current view survives a reload (through the fragment); the
//! back-stack does not.

use std::time::Duration;

use tracing::debug;

/// Length of the cross-fade between views. Purely visual.
pub const FADE_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Home,
    Features,
    Process,
    About,
    PublicReports,
    Dashboard,
    NewReport,
    Analytics,
    Support,
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub view: View,
    pub fragment: &'static str,
    pub deep_link: bool,
    pub pre_auth: bool,
    pub requires_auth: bool,
}

pub const ROUTES: &[Route] = &[
    Route { view: View::Home, fragment: "home", deep_link: false, pre_auth: true, requires_auth: false },
    Route { view: View::Features, fragment: "features", deep_link: false, pre_auth: true, requires_auth: false },
    Route { view: View::Process, fragment: "process", deep_link: false, pre_auth: true, requires_auth: false },
    Route { view: View::About, fragment: "about", deep_link: true, pre_auth: false, requires_auth: false },
    Route { view: View::PublicReports, fragment: "public_reports", deep_link: true, pre_auth: false, requires_auth: false },
    Route { view: View::Dashboard, fragment: "dashboard", deep_link: true, pre_auth: false, requires_auth: true },
    Route { view: View::NewReport, fragment: "new_report", deep_link: false, pre_auth: false, requires_auth: true },
    Route { view: View::Analytics, fragment: "analytics", deep_link: false, pre_auth: false, requires_auth: true },
    Route { view: View::Support, fragment: "support", deep_link: false, pre_auth: false, requires_auth: false },
];

impl View {
    pub fn route(self) -> &'static Route {
        ROUTES
            .iter()
            .find(|r| r.view == self)
            .unwrap_or(&ROUTES[0])
    }

    pub fn fragment(self) -> &'static str {
        self.route().fragment
    }

    /// Accepts `"dashboard"` or `"#dashboard"`.
    pub fn from_fragment(fragment: &str) -> Option<View> {
        let name = fragment.trim().trim_start_matches('#');
        ROUTES.iter().find(|r| r.fragment == name).map(|r| r.view)
    }

    /// Where an authenticated-or-not user lands when nothing else applies.
    pub fn landing(authenticated: bool) -> View {
        if authenticated {
            View::Dashboard
        } else {
            View::Home
        }
    }
}

/// A committed view change. The caller animates the fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: View,
    pub to: View,
    pub fade: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    current: View,
    history: Vec<View>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            current: View::Home,
            history: Vec::new(),
        }
    }

    /// Initial view for a page load carrying `fragment`.
    pub fn restore(fragment: Option<&str>, authenticated: bool) -> Self {
        let current = fragment
            .and_then(View::from_fragment)
            .filter(|view| view.route().deep_link)
            .filter(|view| authenticated || !view.route().requires_auth)
            .unwrap_or(View::Home);
        Self {
            current,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> View {
        self.current
    }

    pub fn history(&self) -> &[View] {
        &self.history
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    /// Fragment mirroring the current view, e.g. `#dashboard`.
    pub fn fragment(&self) -> String {
        format!("#{}", self.current.fragment())
    }

    /// Switch to `view`, pushing the current one. No-op when already there.
    pub fn navigate(&mut self, view: View) -> Option<Transition> {
        if view == self.current {
            return None;
        }
        let from = self.current;
        self.history.push(from);
        self.current = view;
        debug!(from = ?from, to = ?view, depth = self.history.len(), "Navigated");
        Some(Transition {
            from,
            to: view,
            fade: FADE_DURATION,
        })
    }

    /// Pop one view; with an empty stack fall back to the landing view.
    pub fn back(&mut self, authenticated: bool) -> View {
        self.current = self
            .history
            .pop()
            .unwrap_or_else(|| View::landing(authenticated));
        self.current
    }

    pub fn on_sign_out(&mut self) {
        self.history.clear();
        self.current = View::Home;
    }

    /// Pre-auth views redirect to the dashboard and drop out of the history,
    /// so `back` never returns a signed-in user to a landing page.
    pub fn on_sign_in(&mut self) {
        if self.current.route().pre_auth {
            self.history.retain(|view| !view.route().pre_auth);
            self.current = View::Dashboard;
            debug!(depth = self.history.len(), "Redirected to dashboard after sign-in");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_view_has_one_route() {
        let all = [
            View::Home,
            View::Features,
            View::Process,
            View::About,
            View::PublicReports,
            View::Dashboard,
            View::NewReport,
            View::Analytics,
            View::Support,
        ];
        for view in all {
            assert_eq!(ROUTES.iter().filter(|r| r.view == view).count(), 1, "{view:?}");
            assert_eq!(View::from_fragment(view.fragment()), Some(view));
        }
    }

    #[test]
    fn navigate_to_current_is_noop() {
        let mut nav = Navigator::new();
        assert!(nav.navigate(View::Home).is_none());
        assert!(nav.history().is_empty());
    }

    #[test]
    fn navigate_pushes_previous_view() {
        let mut nav = Navigator::new();
        let t = nav.navigate(View::About).unwrap();
        assert_eq!(t.from, View::Home);
        assert_eq!(t.fade, FADE_DURATION);
        nav.navigate(View::PublicReports);
        assert_eq!(nav.history(), &[View::Home, View::About]);
        assert_eq!(nav.fragment(), "#public_reports");
    }

    #[test]
    fn back_pops_in_order() {
        let mut nav = Navigator::new();
        nav.navigate(View::About);
        nav.navigate(View::PublicReports);
        assert_eq!(nav.back(false), View::About);
        assert_eq!(nav.back(false), View::Home);
    }

    #[test]
    fn back_on_empty_stack_lands_by_auth() {
        let mut nav = Navigator::restore(Some("#about"), true);
        assert_eq!(nav.back(true), View::Dashboard);
        assert_eq!(nav.back(true), View::Dashboard);

        let mut nav = Navigator::restore(Some("#about"), false);
        assert_eq!(nav.back(false), View::Home);
    }

    #[test]
    fn restore_respects_allow_list() {
        assert_eq!(Navigator::restore(Some("#about"), false).current(), View::About);
        assert_eq!(Navigator::restore(Some("public_reports"), false).current(), View::PublicReports);
        assert_eq!(Navigator::restore(Some("#dashboard"), true).current(), View::Dashboard);
        assert_eq!(Navigator::restore(Some("#dashboard"), false).current(), View::Home);
        assert_eq!(Navigator::restore(Some("#analytics"), true).current(), View::Home);
        assert_eq!(Navigator::restore(Some("#nonsense"), true).current(), View::Home);
        assert_eq!(Navigator::restore(None, true).current(), View::Home);
    }

    #[test]
    fn sign_in_redirects_only_from_pre_auth_views() {
        let mut nav = Navigator::new();
        nav.navigate(View::Features);
        nav.on_sign_in();
        assert_eq!(nav.current(), View::Dashboard);
        assert!(!nav.can_go_back());
        assert_eq!(nav.back(true), View::Dashboard);

        let mut nav = Navigator::new();
        nav.navigate(View::PublicReports);
        nav.on_sign_in();
        assert_eq!(nav.current(), View::PublicReports);
    }

    #[test]
    fn sign_out_clears_history() {
        let mut nav = Navigator::new();
        nav.navigate(View::Dashboard);
        nav.navigate(View::NewReport);
        nav.on_sign_out();
        assert_eq!(nav.current(), View::Home);
        assert!(!nav.can_go_back());
    }
}
