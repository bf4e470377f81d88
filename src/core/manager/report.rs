use crate::core::{AgentState, TaskStatus};

/// Builds the markdown report for a finished workflow.
///
/// Every failed or skipped task is listed with its reason.
pub fn synthesize_report(state: &AgentState) -> String {
    let mut lines = vec![
        format!("# Report: {}", state.user_request),
        String::new(),
        format!("Status: {}", state.phase),
    ];
    if let Some(failure) = &state.failure {
        lines.push(format!("Failure: {}", failure));
    }

    lines.push(String::new());
    lines.push("## Results".to_string());
    if state.task_results.is_empty() {
        lines.push(String::new());
        lines.push("No task produced a result.".to_string());
    }
    for (id, result) in &state.task_results {
        lines.push(String::new());
        lines.push(match state.plan.get(*id) {
            Some(task) => format!("### Task {} ({}): {}", id, task.task_type, task.description),
            None => format!("### Task {}", id),
        });
        lines.push(result.trim_end().to_string());
    }

    let problems: Vec<String> = state
        .plan
        .tasks()
        .filter(|t| matches!(t.status, TaskStatus::Failed | TaskStatus::Skipped))
        .map(|t| {
            format!(
                "- Task {} ({}): {}",
                t.id,
                t.status,
                t.result.as_deref().unwrap_or("no reason recorded")
            )
        })
        .collect();
    if !problems.is_empty() {
        lines.push(String::new());
        lines.push("## Failed and skipped tasks".to_string());
        lines.push(String::new());
        lines.extend(problems);
    }

    let mut report = lines.join("\n");
    report.push('\n');
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SubTask, WorkflowPhase};

    #[test]
    fn lists_every_failed_and_skipped_task() {
        let mut state = AgentState::new("t".into(), "compare prices".into());
        state
            .install_plan(vec![
                SubTask::new(1, "research", "find prices"),
                SubTask::new(2, "fetch", "download page").optional(),
                SubTask::new(3, "summary", "summarize").with_dependencies([2]),
            ])
            .unwrap();
        state.plan.mark_running(1).unwrap();
        state
            .plan
            .mark_result(1, TaskStatus::Succeeded, Some("42 EUR".into()))
            .unwrap();
        state.task_results.insert(1, "42 EUR".into());
        state.plan.mark_running(2).unwrap();
        state
            .plan
            .mark_result(2, TaskStatus::Skipped, Some("skipped: timeout".into()))
            .unwrap();
        state.set_phase(WorkflowPhase::Completed);

        let report = synthesize_report(&state);
        assert!(report.contains("### Task 1 (research): find prices"));
        assert!(report.contains("42 EUR"));
        assert!(report.contains("- Task 2 (skipped): skipped: timeout"));
        assert!(report.contains("- Task 3 (skipped): skipped: dependency 2 skipped"));
    }

    #[test]
    fn failed_workflow_without_results() {
        let mut state = AgentState::new("t".into(), "deploy".into());
        state
            .install_plan(vec![SubTask::new(1, "code", "ship it")])
            .unwrap();
        state.plan.mark_running(1).unwrap();
        state
            .plan
            .mark_result(1, TaskStatus::Failed, Some("no backend".into()))
            .unwrap();
        state.failure = Some("task 1 failed: no backend".into());
        state.set_phase(WorkflowPhase::Failed);

        let report = synthesize_report(&state);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines[..3],
            ["# Report: deploy", "", "Status: failed"]
        );
        assert_eq!(lines[3], "Failure: task 1 failed: no backend");
        assert!(report.contains("## Results\n\nNo task produced a result.\n"));
        assert_eq!(lines.last().copied(), Some("- Task 1 (failed): no backend"));
        assert!(report.ends_with('\n'));
    }
}
