//! KvTaskStore - 任意の KvEngine 上のローカルストレージエンジン
//!
//! タスク・グループ索引・エラー・オーナー・オフセットをキー空間
//! `t-/g-/e-/o-/f-` にエンコードします（`domain::ids` 参照）。
//!
//! # 学習ポイント
//! - 変更系はイベント列を返すだけ（純粋）、書き込みは `apply` のみ
//! - スキャンは visitor で早期終了する
//! - 値の JSON に id は含めない（キーが id）

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::condition::evaluate;
use crate::domain::contract::SearchFilter;
use crate::domain::events::{Event, EventType};
use crate::domain::ids::{
    Prefix, error_id_for, group_key, group_key_for, offset_key, owner_key, split_key, task_key,
};
use crate::domain::task::{Status, Task};
use crate::error::StoreError;
use crate::impls::round_robin::OwnerRegistry;
use crate::ports::clock::{Clock, SystemClock};
use crate::ports::id_generator::{IdGenerator, TsidGenerator};
use crate::ports::kv_engine::{KvEngine, WriteBatch};
use crate::ports::task_store::{Param, TaskStore};

/// Liveness marker written by `health_check`.
pub const HEALTH_CHECK_KEY: &str = "healthcheck";

/// Which owner keys `owner_unreg` removes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OwnerUnRegScope {
    /// `o-*-{owner}`: the requested owner in every kind.
    #[default]
    Owner,
    /// Every key under `o-`, whoever asked.
    AllOwners,
}

/// Stored value of `t-` and `e-` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskRecord {
    #[serde(rename = "k")]
    kind: String,
    #[serde(rename = "g")]
    group: String,
    #[serde(rename = "o", default)]
    owner: Option<String>,
    #[serde(rename = "s")]
    status: Status,
    #[serde(rename = "p", default)]
    param: Param,
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "e", default)]
    error: Option<String>,
}

impl TaskRecord {
    fn into_task(self, id: String) -> Task {
        Task {
            id,
            kind: self.kind,
            group: self.group,
            owner: self.owner,
            status: self.status,
            param: self.param,
            timestamp: self.timestamp,
            error: self.error,
        }
    }

    fn from_task(task: Task) -> Self {
        Self {
            kind: task.kind,
            group: task.group,
            owner: task.owner,
            status: task.status,
            param: task.param,
            timestamp: task.timestamp,
            error: task.error,
        }
    }
}

fn decode(key: &[u8], value: &[u8]) -> Result<TaskRecord, StoreError> {
    serde_json::from_slice(value).map_err(|source| StoreError::Decode {
        key: String::from_utf8_lossy(key).into_owned(),
        source,
    })
}

fn encode(key: &str, record: &TaskRecord) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(record).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

/// A task about to be created.
struct NewTask {
    id: String,
    group_key: String,
    record: TaskRecord,
}

pub struct KvTaskStore<E> {
    engine: Arc<E>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    owners: OwnerRegistry,
    unreg_scope: OwnerUnRegScope,
}

impl<E: KvEngine> KvTaskStore<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self::with_clock(engine, Arc::new(SystemClock))
    }

    /// Timestamps and tsids both come from `clock`.
    pub fn with_clock(engine: Arc<E>, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            ids: Arc::new(TsidGenerator::new(clock.clone())),
            clock,
            owners: OwnerRegistry::new(),
            unreg_scope: OwnerUnRegScope::default(),
        }
    }

    pub fn with_unreg_scope(mut self, scope: OwnerUnRegScope) -> Self {
        self.unreg_scope = scope;
        self
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    fn load_owners(&self, kind: &str) -> Result<Vec<String>, StoreError> {
        let mut owners = Vec::new();
        self.engine
            .scan(Prefix::Owner.scan_part(kind).as_bytes(), None, &mut |key, _| {
                if let Some(parts) = split_key(&String::from_utf8_lossy(key)) {
                    owners.push(parts.tail.to_string());
                }
                Ok(true)
            })?;
        debug!(kind, owners = owners.len(), "owner list loaded");
        Ok(owners)
    }

    fn new_task(
        &self,
        group: &str,
        kind: &str,
        owner: Option<&str>,
        param: Param,
    ) -> Result<NewTask, StoreError> {
        let rr = self.owners.get_or_load(kind, || self.load_owners(kind))?;
        let owner = owner.or_else(|| rr.next()).map(str::to_string);

        let generated = self.ids.generate();
        let tsid = generated.tsid.to_string();
        Ok(NewTask {
            id: task_key(kind, &tsid),
            group_key: group_key(group, &tsid),
            record: TaskRecord {
                kind: kind.to_string(),
                group: group.to_string(),
                owner,
                status: Status::Virgin,
                param,
                timestamp: generated.timestamp,
                error: None,
            },
        })
    }

    fn search(&self, prefix: Prefix, filter: &SearchFilter) -> Result<Vec<Task>, StoreError> {
        let mut tasks = Vec::new();
        if filter.size == Some(0) {
            return Ok(tasks);
        }
        let scan_prefix = match &filter.kind {
            Some(kind) => prefix.scan_part(kind),
            None => prefix.scan(),
        };

        self.engine
            .scan(scan_prefix.as_bytes(), None, &mut |key, value| {
                let task = decode(key, value)?
                    .into_task(String::from_utf8_lossy(key).into_owned());
                if filter.condition.as_ref().is_none_or(|c| evaluate(&task, c)) {
                    tasks.push(task);
                }
                Ok(filter.size.is_none_or(|size| tasks.len() < size))
            })?;
        Ok(tasks)
    }
}

impl<E: KvEngine> TaskStore for KvTaskStore<E> {
    fn add(
        &self,
        group: &str,
        kind: &str,
        owner: Option<&str>,
        param: Param,
    ) -> Result<Vec<Event>, StoreError> {
        let new = self.new_task(group, kind, owner, param)?;
        let value = encode(&new.id, &new.record)?;
        Ok(vec![
            Event::set(new.id.clone(), value),
            Event::set(new.group_key, new.id),
        ])
    }

    fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        match self.engine.get(id.as_bytes())? {
            Some(value) => Ok(Some(decode(id.as_bytes(), &value)?.into_task(id.to_string()))),
            None => Ok(None),
        }
    }

    fn update(
        &self,
        id: &str,
        status: Status,
        param: Option<Param>,
        error: Option<String>,
        offset: Option<&str>,
    ) -> Result<Vec<Event>, StoreError> {
        let Some(mut task) = self.get(id)? else {
            return Ok(Vec::new());
        };
        if let Some(param) = param {
            task.param = param;
        }
        task.status = status;

        let mut events = Vec::new();
        match status {
            Status::Scheduled => {}
            Status::Virgin => {
                let record = TaskRecord::from_task(task.clone());
                events.push(Event::set(id, encode(id, &record)?));
            }
            Status::Failed => {
                let error_id = error_id_for(id);
                let record = TaskRecord {
                    kind: task.kind.clone(),
                    group: task.group.clone(),
                    owner: task.owner.clone(),
                    status: Status::Failed,
                    param: task.param.clone(),
                    timestamp: self.clock.now(),
                    error,
                };
                events.push(Event::delete(group_key_for(id, &task.group)?));
                events.push(Event::delete(id));
                events.push(Event::set(error_id.clone(), encode(&error_id, &record)?));
            }
            Status::Completed => {
                events.push(Event::delete(group_key_for(id, &task.group)?));
                events.push(Event::delete(id));
            }
        }

        if let (Some(offset), Some(owner)) = (offset, &task.owner) {
            events.push(Event::set(offset_key(owner, &task.kind), offset));
        }
        Ok(events)
    }

    fn update_error(
        &self,
        id: &str,
        status: Status,
        param: Option<Param>,
    ) -> Result<Vec<Event>, StoreError> {
        let Some(mut task) = self.get(id)? else {
            return Ok(Vec::new());
        };
        if let Some(param) = param {
            task.param = param;
        }
        task.status = status;

        let mut events = Vec::new();
        match status {
            Status::Virgin => {}
            Status::Failed => {
                let record = TaskRecord::from_task(task);
                events.push(Event::set(id, encode(id, &record)?));
            }
            Status::Scheduled => {
                // retried tasks go back through round robin
                let new = self.new_task(&task.group, &task.kind, None, task.param)?;
                let value = encode(&new.id, &new.record)?;
                events.push(Event::set(new.id.clone(), value));
                events.push(Event::set(new.group_key, new.id));
                events.push(Event::delete(id));
            }
            Status::Completed => {
                events.push(Event::delete(id));
            }
        }
        Ok(events)
    }

    fn pool(&self, owner: &str, kind: &str, size: usize) -> Result<Vec<Task>, StoreError> {
        let mut tasks = Vec::new();
        if size == 0 {
            return Ok(tasks);
        }
        let offset = self.engine.get(offset_key(owner, kind).as_bytes())?;

        self.engine.scan(
            Prefix::Task.scan_part(kind).as_bytes(),
            offset.as_deref(),
            &mut |key, value| {
                if offset.as_deref() == Some(key) {
                    return Ok(true);
                }
                let record = decode(key, value)?;
                if record.owner.as_deref() == Some(owner) {
                    tasks.push(record.into_task(String::from_utf8_lossy(key).into_owned()));
                }
                Ok(tasks.len() < size)
            },
        )?;
        Ok(tasks)
    }

    fn search_task(&self, filter: &SearchFilter) -> Result<Vec<Task>, StoreError> {
        self.search(Prefix::Task, filter)
    }

    fn search_error_task(&self, filter: &SearchFilter) -> Result<Vec<Task>, StoreError> {
        self.search(Prefix::Error, filter)
    }

    fn get_first_in_group(&self, group: &str) -> Result<Option<String>, StoreError> {
        let mut first = None;
        self.engine
            .scan(Prefix::Group.scan_part(group).as_bytes(), None, &mut |_, value| {
                first = Some(String::from_utf8_lossy(value).into_owned());
                Ok(false)
            })?;
        Ok(first)
    }

    fn owner_reg(&self, owner: &str, kinds: &[String]) -> Result<Vec<Event>, StoreError> {
        Ok(kinds
            .iter()
            .map(|kind| Event::set_empty(owner_key(kind, owner)))
            .collect())
    }

    fn owner_unreg(&self, owner: &str) -> Result<Vec<Event>, StoreError> {
        let mut events = Vec::new();
        self.engine
            .scan(Prefix::Owner.scan().as_bytes(), None, &mut |key, _| {
                let matches = match self.unreg_scope {
                    OwnerUnRegScope::AllOwners => true,
                    OwnerUnRegScope::Owner => split_key(&String::from_utf8_lossy(key))
                        .is_some_and(|parts| parts.tail == owner),
                };
                if matches {
                    events.push(Event::delete(key));
                }
                Ok(true)
            })?;
        Ok(events)
    }

    fn health_check(&self) -> Result<Vec<Event>, StoreError> {
        Ok(vec![Event::set(
            HEALTH_CHECK_KEY,
            self.clock.now().to_rfc3339(),
        )])
    }

    fn apply(&self, events: Vec<Event>) -> Result<(), StoreError> {
        let owner_prefix = Prefix::Owner.scan();
        let touched: BTreeSet<String> = events
            .iter()
            .filter(|e| e.key.starts_with(owner_prefix.as_bytes()))
            .filter_map(|e| split_key(&e.key_str()).map(|parts| parts.part.to_string()))
            .collect();
        let deletes = events
            .iter()
            .filter(|e| e.kind == EventType::Delete)
            .count();

        self.engine.write(WriteBatch::from(events))?;

        for kind in &touched {
            self.owners.invalidate(kind);
        }
        debug!(deletes, owner_kinds = touched.len(), "batch applied");
        Ok(())
    }
}
