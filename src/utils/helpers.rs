use crate::core::{AgentState, TaskStatus, WorkflowPhase};
use crate::event::Event;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Creates the progress spinner used by the interactive runner
///
/// Ticks every 120ms and shows elapsed time next to the message.
pub fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner} [{elapsed_precise}] {msg}")
    {
        spinner.set_style(style);
    }
    spinner
}

/// Logs the message and shows it on the spinner
pub fn pause_and_update(spinner: &ProgressBar, message: &str) {
    info!("{}", message);
    spinner.set_message(message.to_string());
}

/// One-line terminal rendering of an event
pub fn render_event(event: &Event) -> String {
    match event {
        Event::PhaseChanged { from, to, .. } => {
            format!("{} {} -> {}", "phase".bold(), from, paint_phase(*to))
        }
        Event::TaskStarted {
            task_id,
            description,
            ..
        } => format!("{} task {}: {}", "▶".cyan(), task_id, description),
        Event::TaskFinished {
            task_id, status, ..
        } => format!("{} task {} {}", status_marker(*status), task_id, status),
        Event::NewMessage { message, .. } => {
            format!("{}: {}", message.role.dimmed(), message.content)
        }
    }
}

/// Plan as shown at the approval prompt
pub fn render_plan(state: &AgentState) -> String {
    let mut out = format!("{}\n", "Proposed plan".bold().underline());
    for task in state.plan.tasks() {
        let deps = if task.dependencies.is_empty() {
            String::new()
        } else {
            format!(
                " (after {})",
                task.dependencies
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let flags = match (task.required, task.requires_review) {
            (false, true) => " [optional, review]",
            (false, false) => " [optional]",
            (true, true) => " [review]",
            (true, false) => "",
        };
        out.push_str(&format!(
            "  {}. {} {}{}{}\n",
            task.id,
            format!("[{}]", task.task_type).yellow(),
            task.description,
            deps.dimmed(),
            flags.dimmed()
        ));
    }
    out
}

fn paint_phase(phase: WorkflowPhase) -> ColoredString {
    let text = phase.to_string();
    match phase {
        WorkflowPhase::Completed => text.green().bold(),
        WorkflowPhase::Failed | WorkflowPhase::Cancelled | WorkflowPhase::Rejected => {
            text.red().bold()
        }
        WorkflowPhase::AwaitingApproval | WorkflowPhase::AwaitingHumanReview => text.yellow(),
        WorkflowPhase::Planning | WorkflowPhase::Executing => text.cyan(),
    }
}

fn status_marker(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Succeeded => "✔".green(),
        TaskStatus::Failed => "✘".red(),
        TaskStatus::Skipped => "↷".yellow(),
        TaskStatus::Pending | TaskStatus::Running => "•".normal(),
    }
}
