use govflow_core::session::{Capability, Session};
use secrecy::SecretString;
use serde_json::json;

use crate::commands::context::{CommandContext, EXIT_SESSION, EXIT_VALIDATION};
use crate::commands::CommandResult;

/// Stores a session locally. Credentials are checked by the backend on the
/// first call that uses them.
pub fn login(username: &str, role: &str, token: Option<String>) -> CommandResult {
    const COMMAND: &str = "login";

    let mut context = match CommandContext::open(COMMAND) {
        Ok(context) => context,
        Err(result) => return result,
    };
    let username = username.trim();
    if username.is_empty() {
        return CommandResult::failure(
            COMMAND,
            "validation",
            "a username is required",
            EXIT_VALIDATION,
        );
    }

    let token = token
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
        .map(SecretString::from);
    let session = Session::new(username, role, token);
    let data = json!({
        "username": session.username,
        "role": session.role,
        "capabilities": session.capabilities.iter().collect::<Vec<Capability>>(),
        "view_mode": session.default_view_mode(),
    });
    let message = format!("signed in as `{}` ({})", session.username, session.role.as_str());

    if let Err(error) = context.app.sign_in(session) {
        return CommandResult::failure(COMMAND, "session_store", error.to_string(), EXIT_SESSION);
    }
    CommandResult::success_with_data(COMMAND, message, Some(data))
}

pub fn logout() -> CommandResult {
    const COMMAND: &str = "logout";

    let mut context = match CommandContext::open(COMMAND) {
        Ok(context) => context,
        Err(result) => return result,
    };
    let Some(username) = context.app.session().map(|session| session.username.clone()) else {
        return CommandResult::success(COMMAND, "no active session");
    };

    match context.app.sign_out() {
        Ok(()) => CommandResult::success(COMMAND, format!("signed out `{username}`")),
        Err(error) => {
            CommandResult::failure(COMMAND, "session_store", error.to_string(), EXIT_SESSION)
        }
    }
}
