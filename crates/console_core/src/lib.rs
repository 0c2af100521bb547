mod auth;
pub mod config;
pub mod list_state;
pub mod navigation;
pub mod notify;
pub mod pagination;
pub mod pipeline;
pub mod resources;
pub mod session;
pub mod transport;

pub use config::{load_settings, ConsoleSettings};
pub use list_state::{ListController, ListSource, ListView, LoadOutcome, MutableSource};
pub use navigation::{HeadlessNavigator, Navigator};
pub use notify::{BroadcastNotifier, Notification, Notifier, NotifyKind, TracingNotifier};
pub use pagination::{next_page_after_deletion, PaginationState};
pub use pipeline::{PipelineError, PipelineOptions, RequestOptions, RequestPipeline, RequestResult};
pub use session::{AuthSession, FileSessionStore, MemorySessionStore, SessionError, SessionStore};
pub use transport::{Method, ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
