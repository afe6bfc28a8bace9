//! # HealthRecord Core
//!
//! Client core of the HealthRecord document manager. Front ends (the `healthrec` CLI, or a
//! browser UI) sit on top of the types here:
//!
//! - [`session`]: the session store and its read handles
//! - [`routes`]: route classification, the route guard and navigation links
//! - [`auth`]: sign-in, password reset and sign-out flows
//! - [`upload`]: file picking, the chunked upload task and the upload page controller
//! - [`documents`]: the timeline listing, search, download and preview
//! - [`trends`]: the dashboard trend chart
//!
//! External collaborators are reached through the async traits in [`ports`]; [`backends`]
//! provides local implementations so the whole system runs on one machine.
//!
//! **No server concerns**: the processing service lives in `api-rest`, wire types in
//! `api-shared`.

pub mod auth;
pub mod backends;
pub mod config;
pub mod constants;
pub mod documents;
pub mod error;
pub mod notify;
pub mod ports;
pub mod routes;
pub mod session;
pub mod trends;
pub mod upload;

pub use auth::AuthService;
pub use config::CoreConfig;
pub use documents::{
    search_documents, DocumentListing, DocumentQuery, DocumentRecord, DocumentStatus, Preview,
    PreviewKind,
};
pub use error::{
    AuthError, ConfigError, DownloadError, HealthRecordError, HealthRecordResult,
    ProcessingError, QueryError, StorageError, TransferError, UploadError, ValidationError,
};
pub use notify::{CollectingNotifier, Notifier, Toast, ToastVariant};
pub use ports::{AuthProvider, DocumentStore, ObjectStorage, ProcessingClient};
pub use routes::{nav_links, GuardView, HistoryNavigator, NavLink, Navigator, Route, RouteGuard};
pub use session::{Identity, Session, SessionHandle, SessionState, SessionStore};
pub use trends::{DateRange, Metric, TrendPoint, TrendView};
pub use upload::{
    pick_file, ProcessingOutcome, SelectedFile, UploadController, UploadEvent, UploadHandle,
    UploadPipeline, UploadReceipt,
};
