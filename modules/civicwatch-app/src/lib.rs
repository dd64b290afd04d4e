pub mod app;
pub mod audit;
pub mod authority;
pub mod backend;
pub mod dashboard;
pub mod facade;
pub mod health;
pub mod navigation;
pub mod rows;
pub mod state;
pub mod submission;
pub mod support;
pub mod votes;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use app::{App, AppSettings, SignUpOutcome};
pub use backend::{AuthIdentity, Backend, SignUpProfile, SupabaseBackend};
pub use facade::Facade;
pub use navigation::{Navigator, View};
pub use state::{Action, AppState, Store};
