//! Task trait - 型付き Task の定義
//!
//! # 学習ポイント
//! - Associated Constants (`const KIND`)
//! - Trait bounds の組み合わせ (Serialize + DeserializeOwned + Send + Sync + 'static)

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::TaskKind;

/// Task は TaskKind と payload 型を対応付ける
///
/// # 使用例
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendVerifyEmail {
///     username: String,
/// }
///
/// impl Task for SendVerifyEmail {
///     const KIND: TaskKind = TaskKind::SendVerifyEmail;
/// }
/// ```
///
/// # Trait Bounds
/// - `Serialize`: broker に渡す payload の生成のため
/// - `DeserializeOwned`: payload からの復元のため（'static に対応）
/// - `Send + Sync`: 複数ワーカーから安全に使えるため
/// - `'static`: Arc に格納できるため（参照を持たない）
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 閉じた enum なので wire 名の typo は起こり得ない
    const KIND: TaskKind;
}
