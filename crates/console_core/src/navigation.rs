use std::sync::Mutex;

use tracing::info;

/// Router collaborator, only driven when a session expires.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    fn redirect_to(&self, path: &str);
}

/// Tracks a virtual location for front ends without a real router.
pub struct HeadlessNavigator {
    location: Mutex<String>,
}

impl HeadlessNavigator {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(initial_path.into()),
        }
    }
}

impl Default for HeadlessNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for HeadlessNavigator {
    fn current_path(&self) -> String {
        self.location
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn redirect_to(&self, path: &str) {
        info!(path, "navigation: redirecting");
        *self
            .location
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = path.to_string();
    }
}

pub(crate) fn is_at_path(current: &str, target: &str) -> bool {
    let current = current.split(['?', '#']).next().unwrap_or_default();
    current.trim_end_matches('/') == target.trim_end_matches('/')
}
