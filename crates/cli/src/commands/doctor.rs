use std::sync::Arc;

use govflow_client::HttpBackend;
use govflow_core::backend::{ApiError, ApprovalApi};
use govflow_core::config::{AppConfig, LoadOptions};
use govflow_core::session::{AppContext, JsonFileStore};
use serde::Serialize;

use crate::commands::context::block_on;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let (store_check, context) = check_session_store(&config);
            checks.push(store_check);
            checks.push(check_backend_reachability(&config, context.as_ref()));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["session_store", "backend_reachability"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_session_store(config: &AppConfig) -> (DoctorCheck, Option<AppContext>) {
    let path = &config.session.store_path;
    let store = Arc::new(JsonFileStore::new(path.clone()));
    match AppContext::restore(store) {
        Ok(context) => {
            let details = match context.session() {
                Some(session) => format!(
                    "`{}` readable; signed in as `{}` ({})",
                    path.display(),
                    session.username,
                    session.role.as_str()
                ),
                None => format!("`{}` readable; no active session", path.display()),
            };
            let check = DoctorCheck { name: "session_store", status: CheckStatus::Pass, details };
            (check, Some(context))
        }
        Err(error) => {
            let check = DoctorCheck {
                name: "session_store",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
            (check, None)
        }
    }
}

/// Lists pending approvals with the effective credentials. A 401 fails the
/// check even though the backend answered.
fn check_backend_reachability(config: &AppConfig, context: Option<&AppContext>) -> DoctorCheck {
    const NAME: &str = "backend_reachability";

    let stored_token =
        context.and_then(AppContext::session).and_then(|session| session.token.clone());
    let token = config.api.token.clone().or(stored_token);
    let backend = match HttpBackend::from_config(&config.api) {
        Ok(backend) => backend.with_token(token),
        Err(error) => {
            let details = error.to_string();
            return DoctorCheck { name: NAME, status: CheckStatus::Fail, details };
        }
    };

    let result = match block_on("doctor", backend.pending_approvals()) {
        Ok(result) => result,
        Err(_) => {
            return DoctorCheck {
                name: NAME,
                status: CheckStatus::Fail,
                details: "failed to initialize async runtime".to_string(),
            };
        }
    };

    match result {
        Ok(pending) => DoctorCheck {
            name: NAME,
            status: CheckStatus::Pass,
            details: format!(
                "reached `{}` ({} pending approval request(s))",
                backend.base_url(),
                pending.len()
            ),
        },
        Err(ApiError::Unauthorized) => DoctorCheck {
            name: NAME,
            status: CheckStatus::Fail,
            details: format!("`{}` rejected the configured credentials", backend.base_url()),
        },
        Err(error) => DoctorCheck {
            name: NAME,
            status: CheckStatus::Fail,
            details: format!("`{}` is not usable: {error}", backend.base_url()),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
