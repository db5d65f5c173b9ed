use govflow_core::domain::phase::PhaseId;
use govflow_core::domain::process::ProcessId;
use govflow_core::report::PhaseReport;
use govflow_core::session::Capability;
use serde_json::json;

use crate::commands::context::CommandContext;
use crate::commands::CommandResult;

const COMMAND: &str = "report";

pub fn run(process_id: &str, phase_id: &str, json_output: bool) -> CommandResult {
    match build(process_id, phase_id, json_output) {
        Ok(result) | Err(result) => result,
    }
}

fn build(
    process_id: &str,
    phase_id: &str,
    json_output: bool,
) -> Result<CommandResult, CommandResult> {
    let mut context = CommandContext::open(COMMAND)?;
    context.actor_with(Capability::ViewReports)?;
    let backend = context.backend()?;
    let process_id = ProcessId(process_id.trim().to_owned());
    let phase_id = PhaseId(phase_id.trim().to_owned());

    let collected = context.block_on(PhaseReport::collect(
        backend.clone(),
        backend.as_ref(),
        process_id,
        &phase_id,
    ))?;
    let report = match collected {
        Ok(report) => report,
        Err(error) => {
            let message = format!("the report for phase `{phase_id}` could not be built");
            return Err(context.fail(error, message));
        }
    };

    if json_output {
        let message = format!("phase `{}` is {}% complete", report.phase_id, report.progress);
        return Ok(CommandResult::success_with_data(COMMAND, message, Some(json!(report))));
    }
    Ok(CommandResult::text(report.render_text()))
}
