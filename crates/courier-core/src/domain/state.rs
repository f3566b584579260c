//! State - broker が管理するタスクの状態

use serde::{Deserialize, Serialize};

/// TaskState はタスクの状態を表現
///
/// # 状態遷移
/// - scheduled: 実行時刻待ち
/// - pending: 実行可能
/// - active: 配信済み（lease 中）
/// - retry: バックオフ待ち
/// - archived: リトライ上限到達 or 恒久エラー
/// - completed: ack 済み
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Scheduled,
    Pending,
    Active,
    Retry,
    Archived,
    Completed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Archived | TaskState::Completed)
    }
}
