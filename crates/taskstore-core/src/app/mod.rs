//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてパーティションのルーティングと
//! コマンド／クエリのオーケストレーションを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **HashRing**: group → 担当ノード
//! - **Commands**: 書き込み系（Add, Update, OwnerReg, Search{Delete,Update}...）
//! - **Queries**: 読み取り系（Get, GetFirstInGroup, Pool, Search...）

pub mod builder;
pub mod command;
pub mod context;
pub mod query;
pub mod ring;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::command::Commands;
pub use self::context::{Context, Target};
pub use self::query::Queries;
pub use self::ring::HashRing;
