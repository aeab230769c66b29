//! Commands - 書き込み系のハンドラ
//!
//! # 設計原則
//! - 入力検証は I/O の前に行う（失敗は `TaskStoreError::Validation`）
//! - group で決まる操作は ring で担当ノードを選び、自ノードならローカル実行、
//!   そうでなければ担当ノードに 1 ホップだけ転送する
//! - 全ノードに及ぶ操作は `internal=true` で各ピアを直接呼ぶ（再ブロードキャストしない）
//! - どのノードの失敗も操作全体の失敗になる（部分成功は報告しない）

use std::sync::Arc;

use crate::app::context::Context;

pub mod add_task;
pub mod health_check;
pub mod owner_reg;
pub mod owner_unreg;
pub mod search_delete_error_task;
pub mod search_delete_task;
pub mod search_update_error_task;
pub mod search_update_task;
pub mod update_task;

pub use self::add_task::AddTask;
pub use self::health_check::HealthCheck;
pub use self::owner_reg::OwnerReg;
pub use self::owner_unreg::OwnerUnReg;
pub use self::search_delete_error_task::SearchDeleteErrorTask;
pub use self::search_delete_task::SearchDeleteTask;
pub use self::search_update_error_task::SearchUpdateErrorTask;
pub use self::search_update_task::SearchUpdateTask;
pub use self::update_task::UpdateTask;

pub struct Commands {
    pub add_task: AddTask,
    pub update_task: UpdateTask,
    pub owner_reg: OwnerReg,
    pub owner_unreg: OwnerUnReg,
    pub search_delete_task: SearchDeleteTask,
    pub search_delete_error_task: SearchDeleteErrorTask,
    pub search_update_task: SearchUpdateTask,
    pub search_update_error_task: SearchUpdateErrorTask,
    pub health_check: HealthCheck,
}

impl Commands {
    pub(crate) fn new(ctx: &Arc<Context>) -> Self {
        Self {
            add_task: AddTask::new(ctx.clone()),
            update_task: UpdateTask::new(ctx.clone()),
            owner_reg: OwnerReg::new(ctx.clone()),
            owner_unreg: OwnerUnReg::new(ctx.clone()),
            search_delete_task: SearchDeleteTask::new(ctx.clone()),
            search_delete_error_task: SearchDeleteErrorTask::new(ctx.clone()),
            search_update_task: SearchUpdateTask::new(ctx.clone()),
            search_update_error_task: SearchUpdateErrorTask::new(ctx.clone()),
            health_check: HealthCheck::new(ctx.clone()),
        }
    }
}
