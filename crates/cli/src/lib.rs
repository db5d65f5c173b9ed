pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use govflow_core::config::{AppConfig, LoadOptions, LogFormat};

use crate::commands::answer::AnswerEdit;
use crate::commands::approvals::Decision;

#[derive(Debug, Parser)]
#[command(
    name = "govflow",
    about = "Governance questionnaire and phase approval CLI",
    long_about = "Sign in, answer phase questionnaires, request and review phase approvals, and print phase reports against the governance backend.",
    after_help = "Examples:\n  govflow login --username ana --role user --token <token>\n  govflow answer --process P-1 --phase F-1 --question Q-1 --value \"Core banking\"\n  govflow request --process P-1 --phase F-1\n  govflow review A-1 --decision reject --reason \"missing owners\"\n  govflow report --process P-1 --phase F-1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the session store, and backend reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Store a local session for subsequent commands")]
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "user", help = "Role as delivered by the identity provider")]
        role: String,
        #[arg(long, help = "Bearer token sent to the backend")]
        token: Option<String>,
    },
    #[command(about = "Drop the local session")]
    Logout,
    #[command(about = "Save one answer of a phase questionnaire")]
    Answer {
        #[arg(long)]
        process: String,
        #[arg(long)]
        phase: String,
        #[arg(long)]
        question: String,
        #[arg(long, help = "Text, YYYY-MM-DD date, or table cell value; empty clears")]
        value: String,
        #[arg(long, help = "Zero-based table row")]
        row: Option<usize>,
        #[arg(long, help = "Zero-based table column")]
        column: Option<usize>,
    },
    #[command(about = "Request approval of a phase")]
    Request {
        #[arg(long)]
        process: String,
        #[arg(long)]
        phase: String,
        #[arg(long)]
        comments: Option<String>,
    },
    #[command(about = "List pending approval requests")]
    Pending,
    #[command(about = "Approve or reject a pending approval request")]
    Review {
        approval_id: String,
        #[arg(long, value_enum)]
        decision: Decision,
        #[arg(long, help = "Required when rejecting")]
        reason: Option<String>,
    },
    #[command(about = "Print the answers, progress, and approval status of a phase")]
    Report {
        #[arg(long)]
        process: String,
        #[arg(long)]
        phase: String,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Login { username, role, token } => {
            commands::session::login(&username, &role, token)
        }
        Command::Logout => commands::session::logout(),
        Command::Answer { process, phase, question, value, row, column } => {
            commands::answer::run(AnswerEdit {
                process_id: process,
                phase_id: phase,
                question_id: question,
                value,
                row,
                column,
            })
        }
        Command::Request { process, phase, comments } => {
            commands::approvals::request(&process, &phase, comments)
        }
        Command::Pending => commands::approvals::pending(),
        Command::Review { approval_id, decision, reason } => {
            commands::approvals::review(&approval_id, decision, reason.as_deref())
        }
        Command::Report { process, phase, json } => commands::report::run(&process, &phase, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
