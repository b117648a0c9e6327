//! Custom assertion helpers with clearer failure messages than a bare
//! `assert_eq!` on a whole struct would give.

use orchestrator_core::models::{Task, TaskStatus};

/// Assert tasks are equal ignoring timestamps and retry bookkeeping.
pub fn assert_task_equals(actual: &Task, expected: &Task) {
    assert_eq!(actual.id, expected.id, "task IDs don't match");
    assert_eq!(actual.title, expected.title, "task titles don't match");
    assert_eq!(actual.description, expected.description, "task descriptions don't match");
    assert_eq!(actual.assigned_to, expected.assigned_to, "task assignees don't match");
    assert_eq!(actual.status, expected.status, "task statuses don't match");
}

/// Assert a state transition is legal per `TaskStatus::can_transition_to`.
pub fn assert_status_transition_valid(from: TaskStatus, to: TaskStatus) {
    assert!(from.can_transition_to(to), "expected transition from {from:?} to {to:?} to be valid, but it's not");
}

/// Assert a state transition is illegal per `TaskStatus::can_transition_to`.
pub fn assert_status_transition_invalid(from: TaskStatus, to: TaskStatus) {
    assert!(!from.can_transition_to(to), "expected transition from {from:?} to {to:?} to be invalid, but it's valid");
}

/// Assert a task list contains a task with the given title.
pub fn assert_contains_task_with_title(tasks: &[Task], title: &str) {
    assert!(
        tasks.iter().any(|t| t.title == title),
        "expected to find a task titled '{title}', but it wasn't found. available titles: {:?}",
        tasks.iter().map(|t| &t.title).collect::<Vec<_>>()
    );
}

/// Assert tasks are sorted by creation date, oldest first.
pub fn assert_tasks_sorted_by_created_at(tasks: &[Task]) {
    for window in tasks.windows(2) {
        assert!(
            window[0].created_at <= window[1].created_at,
            "tasks are not sorted by creation date (oldest first). '{}' ({}) comes before '{}' ({})",
            window[0].title,
            window[0].created_at,
            window[1].title,
            window[1].created_at
        );
    }
}

/// Flexible task matcher for partial assertions.
#[derive(Debug, Default)]
pub struct TaskMatcher {
    pub title: Option<String>,
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_assigned_to(mut self, agent: impl Into<String>) -> Self {
        self.assigned_to = Some(agent.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Assert a task matches a partial set of expected fields.
pub fn assert_task_matches(task: &Task, matcher: &TaskMatcher) {
    if let Some(title) = &matcher.title {
        assert_eq!(&task.title, title, "task title doesn't match expected");
    }
    if let Some(agent) = &matcher.assigned_to {
        assert_eq!(task.assigned_to.as_ref().map(|a| a.as_str()), Some(agent.as_str()), "task assignee doesn't match expected");
    }
    if let Some(status) = matcher.status {
        assert_eq!(task.status, status, "task status doesn't match expected");
    }
}
