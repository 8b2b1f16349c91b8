//! File-drop handoff to the remote fulfillment system.

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod handoff;
pub mod sftp;
pub mod staging;

pub use dispatch::Dispatcher;
pub use error::{DispatchError, HandoffError, HandoffFailure, StagingError};
pub use handoff::{RemoteHandoff, TransferSession, Transport};
pub use sftp::OpenSshTransport;
pub use staging::{StagedFilePair, TransferStaging};
