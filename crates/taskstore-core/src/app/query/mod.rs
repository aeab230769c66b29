//! Queries - 読み取り系のハンドラ
//!
//! 読み取りは MutationLog を通らず、ローカルのストレージを直接読みます。

use std::sync::Arc;

use crate::app::context::Context;

pub mod get;
pub mod get_first_in_group;
pub mod pool;
pub mod search_error_task;
pub mod search_task;

pub use self::get::Get;
pub use self::get_first_in_group::GetFirstInGroup;
pub use self::pool::{POOL_SIZE, Pool};
pub use self::search_error_task::SearchErrorTask;
pub use self::search_task::SearchTask;

pub struct Queries {
    pub get: Get,
    pub get_first_in_group: GetFirstInGroup,
    pub pool: Pool,
    pub search_task: SearchTask,
    pub search_error_task: SearchErrorTask,
}

impl Queries {
    pub(crate) fn new(ctx: &Arc<Context>) -> Self {
        Self {
            get: Get::new(ctx.clone()),
            get_first_in_group: GetFirstInGroup::new(ctx.clone()),
            pool: Pool::new(ctx.clone()),
            search_task: SearchTask::new(ctx.clone()),
            search_error_task: SearchErrorTask::new(ctx.clone()),
        }
    }
}
