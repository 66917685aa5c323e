use std::sync::Arc;

use debridarr_core::{
    AuditStore, Config, NotificationStore, ProgramRunner, QueueManager, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    runner: Arc<ProgramRunner>,
    audit_store: Arc<dyn AuditStore>,
    notification_store: Arc<dyn NotificationStore>,
}

impl AppState {
    pub fn new(
        runner: Arc<ProgramRunner>,
        audit_store: Arc<dyn AuditStore>,
        notification_store: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            runner,
            audit_store,
            notification_store,
        }
    }

    pub fn config(&self) -> &Config {
        self.runner.manager().config()
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(self.config())
    }

    pub fn runner(&self) -> &Arc<ProgramRunner> {
        &self.runner
    }

    pub fn manager(&self) -> &Arc<QueueManager> {
        self.runner.manager()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    pub fn notification_store(&self) -> &dyn NotificationStore {
        self.notification_store.as_ref()
    }
}
