use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use voltquote_core::config::{AppConfig, ConfigError};
use voltquote_core::verify::{
    CodeSender, ContactDirectory, InMemoryVerificationStore, RandomCodeGenerator,
    VerificationService,
};
use voltquote_crm::{CrmQuotes, FixtureCrm, HubSpotClient};
use voltquote_whatsapp::{ConsoleSender, UltraMsgSender};

use crate::scheduling::{FixtureWorkflow, HttpWorkflowClient, WorkflowClient};

/// Stage id the fixture CRM treats as "won". Live deployments configure
/// their own stage ids; this one only has to match the fixture data.
const FIXTURE_WON_STAGE_ID: &str = "2705156301";

/// Shared handler state. Every collaborator sits behind its seam so
/// live and fixture deployments run the exact same handlers.
#[derive(Clone)]
pub struct AppState {
    pub verification: Arc<VerificationService>,
    pub crm: Arc<dyn CrmQuotes>,
    pub workflow: Arc<dyn WorkflowClient>,
    pub won_stage_id: String,
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("crm client setup failed: {0}")]
    Crm(#[source] anyhow::Error),
    #[error("whatsapp client setup failed: {0}")]
    WhatsApp(#[source] anyhow::Error),
    #[error("workflow client setup failed: {0}")]
    Workflow(#[source] anyhow::Error),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let (directory, crm, crm_mode): (Arc<dyn ContactDirectory>, Arc<dyn CrmQuotes>, &str) =
        if config.crm.is_live() {
            let client =
                Arc::new(HubSpotClient::from_config(&config.crm).map_err(BootstrapError::Crm)?);
            (client.clone(), client, "live")
        } else {
            let fixture = Arc::new(FixtureCrm::new());
            (fixture.clone(), fixture, "fixture")
        };

    let (sender, whatsapp_mode): (Arc<dyn CodeSender>, &str) = if config.whatsapp.is_live() {
        let client = UltraMsgSender::from_config(&config.whatsapp).map_err(BootstrapError::WhatsApp)?;
        (Arc::new(client), "live")
    } else {
        (Arc::new(ConsoleSender), "console")
    };

    let (workflow, workflow_mode): (Arc<dyn WorkflowClient>, &str) = if config.workflow.is_live() {
        let client =
            HttpWorkflowClient::from_config(&config.workflow).map_err(BootstrapError::Workflow)?;
        (Arc::new(client), "live")
    } else {
        (Arc::new(FixtureWorkflow), "fixture")
    };

    let won_stage_id = if config.crm.is_live() {
        config.crm.won_stage_id.clone().ok_or_else(|| {
            ConfigError::Validation("crm.won_stage_id is required when the CRM client is live".into())
        })?
    } else {
        config.crm.won_stage_id.clone().unwrap_or_else(|| FIXTURE_WON_STAGE_ID.to_string())
    };

    let verification = Arc::new(VerificationService::new(
        Arc::new(InMemoryVerificationStore::default()),
        directory,
        sender,
        Arc::new(RandomCodeGenerator),
    ));

    info!(
        event_name = "system.bootstrap.ready",
        crm_mode,
        whatsapp_mode,
        workflow_mode,
        "application collaborators assembled"
    );

    Ok(Application { state: AppState { verification, crm, workflow, won_stage_id }, config })
}

#[cfg(test)]
pub(crate) fn test_app(codes: &[&str]) -> (AppState, Arc<FixtureCrm>) {
    use std::collections::VecDeque;

    use voltquote_core::verify::CodeGenerator;

    struct ScriptedCodes(std::sync::Mutex<VecDeque<String>>);

    impl CodeGenerator for ScriptedCodes {
        fn generate(&self) -> String {
            self.0
                .lock()
                .expect("code script lock")
                .pop_front()
                .unwrap_or_else(|| "999999".to_string())
        }
    }

    let crm = Arc::new(FixtureCrm::new());
    let verification = Arc::new(VerificationService::new(
        Arc::new(InMemoryVerificationStore::default()),
        crm.clone(),
        Arc::new(ConsoleSender),
        Arc::new(ScriptedCodes(std::sync::Mutex::new(
            codes.iter().map(|code| (*code).to_string()).collect(),
        ))),
    ));

    let state = AppState {
        verification,
        crm: crm.clone(),
        workflow: Arc::new(FixtureWorkflow),
        won_stage_id: FIXTURE_WON_STAGE_ID.to_string(),
    };
    (state, crm)
}
