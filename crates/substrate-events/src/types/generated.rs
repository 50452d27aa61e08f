//! The closed event-kind vocabulary.
//!
//! One macro invocation, one source of truth for `Display`, `FromStr`, and
//! serde — see [`crate::types::macros::define_event_types`].

use super::macros::define_event_types;

define_event_types! {
    SessionStart => "session.start",
    SessionEnd => "session.end",
    SessionFork => "session.fork",

    MessageUser => "message.user",
    MessageAssistant => "message.assistant",
    MessageDeleted => "message.deleted",

    ToolCall => "tool.call",
    ToolResult => "tool.result",
    ErrorTool => "error.tool",

    StreamTurnStart => "stream.turn_start",
    StreamTurnEnd => "stream.turn_end",

    ErrorAgent => "error.agent",
    ErrorProvider => "error.provider",

    ConfigModelSwitch => "config.model_switch",
    ConfigReasoningLevel => "config.reasoning_level",

    ContextCleared => "context.cleared",
    CompactBoundary => "compact.boundary",
    CompactSummary => "compact.summary",

    SkillAdded => "skill.added",
    SkillRemoved => "skill.removed",
    PlanModeEntered => "plan.mode_entered",
    PlanModeExited => "plan.mode_exited",
    TodoWrite => "todo.write",
    NotificationInterrupted => "notification.interrupted",

    WorktreeAcquired => "worktree.acquired",
    WorktreeCommit => "worktree.commit",
    WorktreeReleased => "worktree.released",
    WorktreeMerged => "worktree.merged",
}
