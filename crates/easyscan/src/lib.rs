pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod logging;
pub mod lookup;
pub mod notify;
pub mod record;
pub mod sanitize;
pub mod secrets;
pub mod session;
pub mod transfer;
pub mod workflow;

pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, EasyScanError, Result};
pub use identity::{IdentityAssertion, IdentityEvaluator, UserInfo};
pub use lookup::{LookupError, TitleLookup, TitleSource};
pub use notify::{EmailMessage, Mailer, NotifyError, SendmailMailer};
pub use record::{CodecError, NewScanRequest, ScanRequestRecord};
pub use secrets::{resolve_secret, SecretError};
pub use session::{ItemInfo, MemorySessionStore, SessionState, SessionStore};
pub use transfer::{
    DispatchError, Dispatcher, HandoffError, RemoteHandoff, StagedFilePair, StagingError,
    TransferStaging,
};
pub use workflow::{
    CitationForm, Page, RequestContext, Response, Workflow, WorkflowError, WorkflowServices,
    WorkflowState,
};
