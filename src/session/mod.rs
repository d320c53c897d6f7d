pub mod catalog;
pub mod error;
pub mod record;
pub mod search;
pub mod switcher;
pub mod working;

pub use error::SessionError;
pub use record::{ConnectionInfo, SessionCollection, SessionId, SessionMeta, SessionRecord};
pub use switcher::{SessionManager, SwitchOutcome};
pub use working::{UiState, WorkingState};
