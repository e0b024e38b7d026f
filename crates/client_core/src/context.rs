//! Application context: owns the session store and the collaborators for
//! the lifetime of the application.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    config::Settings,
    rest::{CallableScoringFunction, FederatedPrompt, RestIdentityProvider, RestObjectStorage},
    routing::RoutingShell,
    session::{IdentityProvider, SessionStore, SessionSubscription},
    workflow::{Clock, ObjectStorage, ScoringFunction, SystemClock, UploadAnalyzeWorkflow},
};

pub struct AppContext {
    settings: Settings,
    session: Arc<SessionStore>,
    subscription: Option<SessionSubscription>,
    storage: Arc<dyn ObjectStorage>,
    scoring: Arc<dyn ScoringFunction>,
    clock: Arc<dyn Clock>,
    restore_task: Option<JoinHandle<()>>,
}

impl AppContext {
    /// Builds the REST-backed collaborators and starts the session store.
    /// Persisted-session restoration runs in the background; the store stays
    /// loading until it finishes.
    pub fn init(settings: Settings, prompt: Arc<dyn FederatedPrompt>) -> Result<Self> {
        settings.validate()?;
        let identity = Arc::new(RestIdentityProvider::new(&settings, prompt)?);
        let storage = Arc::new(RestObjectStorage::new(&settings, identity.clone())?);
        let scoring = Arc::new(CallableScoringFunction::new(&settings, identity.clone())?);

        let mut context = Self::with_collaborators(
            settings,
            identity.clone(),
            storage,
            scoring,
            Arc::new(SystemClock),
        );
        context.restore_task = Some(tokio::spawn(async move {
            identity.restore_persisted_session().await;
        }));
        info!(project = %context.settings.project_id, "application context initialized");
        Ok(context)
    }

    pub fn with_collaborators(
        settings: Settings,
        identity: Arc<dyn IdentityProvider>,
        storage: Arc<dyn ObjectStorage>,
        scoring: Arc<dyn ScoringFunction>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (session, subscription) = SessionStore::start(identity);
        Self {
            settings,
            session,
            subscription: Some(subscription),
            storage,
            scoring,
            clock,
            restore_task: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn routing_shell(&self) -> RoutingShell {
        RoutingShell::new(self.session.subscribe())
    }

    /// Fresh workflow for a newly mounted home view. The caller tears it
    /// down when the view goes away.
    pub fn mount_workflow(&self) -> Arc<UploadAnalyzeWorkflow> {
        UploadAnalyzeWorkflow::new_with_dependencies(
            Arc::clone(&self.session),
            Arc::clone(&self.storage),
            Arc::clone(&self.scoring),
            Arc::clone(&self.clock),
            self.settings.scoring_function.clone(),
        )
    }

    pub fn teardown(mut self) {
        if let Some(task) = self.restore_task.take() {
            task.abort();
        }
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        info!("application context torn down");
    }
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
