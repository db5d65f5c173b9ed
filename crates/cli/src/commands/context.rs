use std::future::Future;
use std::sync::Arc;

use govflow_client::HttpBackend;
use govflow_core::backend::ApiError;
use govflow_core::config::{AppConfig, LoadOptions};
use govflow_core::errors::ApplicationError;
use govflow_core::session::{Actor, AppContext, Capability, JsonFileStore, Session};
use tracing::{error, warn};
use uuid::Uuid;

use crate::commands::CommandResult;

pub(crate) const EXIT_RUNTIME: u8 = 1;
pub(crate) const EXIT_CONFIG: u8 = 2;
pub(crate) const EXIT_SESSION: u8 = 3;
pub(crate) const EXIT_BACKEND: u8 = 4;
pub(crate) const EXIT_VALIDATION: u8 = 5;

/// Effective config plus the persisted session, shared by every command that
/// talks to the backend.
pub(crate) struct CommandContext {
    command: &'static str,
    pub(crate) config: AppConfig,
    pub(crate) app: AppContext,
}

impl CommandContext {
    pub(crate) fn open(command: &'static str) -> Result<Self, CommandResult> {
        let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
            CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
        })?;
        let store = Arc::new(JsonFileStore::new(config.session.store_path.clone()));
        let app = AppContext::restore(store).map_err(|error| {
            CommandResult::failure(command, "session_store", error.to_string(), EXIT_SESSION)
        })?;
        Ok(Self { command, config, app })
    }

    /// Configured token first, then the one stored with the session.
    pub(crate) fn backend(&self) -> Result<Arc<HttpBackend>, CommandResult> {
        let token = self
            .config
            .api
            .token
            .clone()
            .or_else(|| self.app.session().and_then(|session| session.token.clone()));
        let backend = HttpBackend::from_config(&self.config.api).map_err(|error| {
            let message = error.to_string();
            CommandResult::failure(self.command, "config_validation", message, EXIT_CONFIG)
        })?;
        Ok(Arc::new(backend.with_token(token)))
    }

    pub(crate) fn session(&self) -> Result<&Session, CommandResult> {
        self.app.session().ok_or_else(|| {
            CommandResult::failure(
                self.command,
                "not_signed_in",
                "no active session; run `govflow login` first",
                EXIT_SESSION,
            )
        })
    }

    pub(crate) fn actor_with(&self, capability: Capability) -> Result<Actor, CommandResult> {
        let actor = self.session()?.actor();
        if !actor.can(capability) {
            return Err(CommandResult::failure(
                self.command,
                "forbidden",
                format!("`{}` is not allowed to {}", actor.username, describe(capability)),
                EXIT_VALIDATION,
            ));
        }
        Ok(actor)
    }

    /// Turns a failed operation into the command's result, dropping the
    /// stored session when the backend no longer accepts it.
    pub(crate) fn fail(&mut self, error: ApplicationError, message: String) -> CommandResult {
        if let ApplicationError::Backend(api_error) = &error {
            if let Err(store_error) = self.app.handle_api_error(api_error) {
                warn!(
                    event_name = "cli.session_store_failed",
                    command = self.command,
                    error = %store_error,
                    "could not drop the rejected session"
                );
            }
        }
        application_failure(self.command, error, message)
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> Result<F::Output, CommandResult> {
        block_on(self.command, future)
    }
}

pub(crate) fn block_on<F: Future>(command: &str, future: F) -> Result<F::Output, CommandResult> {
    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        })?;
    Ok(runtime.block_on(future))
}

fn application_failure(command: &str, error: ApplicationError, message: String) -> CommandResult {
    let (error_class, exit_code) = match &error {
        ApplicationError::Domain(_) | ApplicationError::Busy(_) => ("validation", EXIT_VALIDATION),
        ApplicationError::Backend(ApiError::Unauthorized) => ("session_expired", EXIT_SESSION),
        ApplicationError::Backend(ApiError::Status { status, .. }) if *status < 500 => {
            ("backend_rejected", EXIT_BACKEND)
        }
        ApplicationError::Backend(_) => ("backend_unavailable", EXIT_BACKEND),
        ApplicationError::Configuration(_) => ("config_validation", EXIT_CONFIG),
    };

    let interface = error.into_interface(Uuid::new_v4().to_string());
    error!(
        event_name = "cli.command_failed",
        command,
        error_class,
        correlation_id = interface.correlation_id(),
        error = %interface,
        "command failed"
    );
    CommandResult::failure(
        command,
        error_class,
        format!("{message} ({interface}; correlation_id={})", interface.correlation_id()),
        exit_code,
    )
}

fn describe(capability: Capability) -> &'static str {
    match capability {
        Capability::EditAnswers => "edit answers",
        Capability::RequestApproval => "request approvals",
        Capability::ReviewApprovals => "review approvals",
        Capability::ViewReports => "view reports",
        Capability::ManageProcesses => "manage processes",
        Capability::ManageUsers => "manage users",
    }
}
