//! Client core for the résumé match checker: session lifecycle, the
//! upload-and-analyze workflow, result presentation, routing, and REST
//! adapters for the hosted identity, storage and function services.

pub mod config;
pub mod context;
pub mod error;
pub mod presentation;
pub mod rest;
pub mod routing;
pub mod session;
pub mod views;
pub mod workflow;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

pub use config::{load_settings, Settings};
pub use context::AppContext;
pub use error::{
    AnalysisError, AuthenticationError, ConfigError, CredentialError, UploadError,
    ValidationError, WorkflowError,
};
pub use presentation::{AnalysisResult, RenderedResult, ResultOverlay, ScoreTier};
pub use routing::{resolve_route, Route, RoutingShell};
pub use session::{
    FederatedSignIn, IdentityProvider, ProviderAuthState, SessionState, SessionStore,
    SessionSubscription,
};
pub use views::{AuthForm, FormPurpose, ViewOutcome};
pub use workflow::{
    validate_candidate, Clock, FileCandidate, ObjectStorage, ScoringFunction, SelectionSource,
    SubmitOutcome, SystemClock, UploadAnalyzeWorkflow, UploadDraft, WorkflowEvent,
};
