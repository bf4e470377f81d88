/// Capability assumed when neither the task nor the configuration names one
pub const DEFAULT_CAPABILITY: &str = "general";

/// Capability the planner asks for when none is configured
pub const PLANNING_CAPABILITY: &str = "planning";

/// Longest body kept from a fetch task
pub const FETCH_MAX_CHARS: usize = 20_000;

/// System prompt for research, analysis and summary tasks
pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a meticulous research assistant. Gather the relevant facts, analyse them and answer the task precisely. Cite the earlier step results you rely on and state clearly when information is missing.";

/// System prompt for code and calculation tasks
pub const CODE_SYSTEM_PROMPT: &str = "You are an expert software engineer. Solve the task with correct, minimal code and show the computed result. Use the results of earlier steps as inputs where relevant.";

/// System prompt for any other task type
pub const GENERAL_SYSTEM_PROMPT: &str = "You are a helpful assistant executing one step of a larger plan. Complete only this step, concisely and accurately.";

/// System prompt for the planner
pub const PLANNER_SYSTEM_PROMPT: &str = "You are an expert task planning agent. You decompose user requests into structured, executable subtasks and answer with JSON only.";

/// Instructions appended to every planning request
pub const PLANNER_USER_PROMPT: &str = "TASK TYPES:
- research: information gathering, content analysis
- code: programming, calculations, data processing
- analysis: text analysis
- summary: content summarization
- fetch: download the content of one http(s) url given in the description

RULES:
1. Answer with a JSON array of tasks with: id, type, description, dependencies, status
2. Use sequential ids starting from 1
3. Set every status to \"pending\"
4. Only include dependencies that are truly necessary
5. Be specific in task descriptions

Format:
[
  {\"id\": 1, \"type\": \"research\", \"description\": \"Specific task description\", \"dependencies\": [], \"status\": \"pending\", \"result\": null}
]";

/// Picks the system prompt for a task type
pub fn task_system_prompt(task_type: &str) -> &'static str {
    match task_type {
        "research" | "analysis" | "summary" => RESEARCH_SYSTEM_PROMPT,
        "code" | "calculation" => CODE_SYSTEM_PROMPT,
        _ => GENERAL_SYSTEM_PROMPT,
    }
}
