// ==========================================
// 羊群档案系统 - 事件下拉选项 API
// ==========================================
// 职责: 事件类型 / 事件描述 候选项的查询与维护
// 约束:
// - owner 首次访问时写入默认选项
// - 默认选项不可删除；删除事件类型级联删除其描述
// - 跨 owner 访问一律 NotFound
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{EventDescriptionOption, EventTypeOption};
use crate::repository::EventOptionRepository;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub struct EventOptionApi {
    conn: Arc<Mutex<Connection>>,
}

impl EventOptionApi {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取连接锁，并确保 owner 已有默认选项
    fn lock_seeded(&self, owner_id: i64) -> ApiResult<MutexGuard<'_, Connection>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))?;

        if EventOptionRepository::count_types(&conn, owner_id)? == 0 {
            let tx = conn.transaction()?;
            let seeded = EventOptionRepository::seed_defaults_tx(&tx, owner_id)?;
            tx.commit()?;
            info!(owner_id, seeded, "已写入默认事件选项");
        }
        Ok(conn)
    }

    /// 全部事件类型及其描述（默认项在前，其余按名称升序）
    pub fn list_event_options(&self, owner_id: i64) -> ApiResult<Vec<EventTypeOption>> {
        let conn = self.lock_seeded(owner_id)?;
        Ok(EventOptionRepository::list_types(&conn, owner_id)?)
    }

    /// 新增自定义事件类型
    ///
    /// # 返回
    /// - Err(InvalidInput): 名称为空
    /// - Err(Conflict): 同名类型已存在
    pub fn add_event_type(&self, owner_id: i64, name: &str) -> ApiResult<EventTypeOption> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::InvalidInput("事件类型名称不能为空".to_string()));
        }

        let mut conn = self.lock_seeded(owner_id)?;
        if EventOptionRepository::type_name_exists(&conn, owner_id, name)? {
            return Err(ApiError::Conflict(format!("事件类型 {} 已存在", name)));
        }

        let tx = conn.transaction()?;
        let type_id = EventOptionRepository::insert_type_tx(&tx, owner_id, name, false)?;
        tx.commit()?;

        info!(owner_id, name, "事件类型已新增");
        EventOptionRepository::find_type(&conn, owner_id, type_id)?
            .ok_or_else(|| ApiError::NotFound(format!("事件类型 {}", type_id)))
    }

    /// 删除自定义事件类型（默认类型不可删除）
    pub fn delete_event_type(&self, owner_id: i64, type_id: i64) -> ApiResult<()> {
        let mut conn = self.lock_seeded(owner_id)?;
        let option = EventOptionRepository::find_type(&conn, owner_id, type_id)?
            .ok_or_else(|| ApiError::NotFound(format!("事件类型 {}", type_id)))?;
        if option.is_default {
            return Err(ApiError::InvalidInput(format!(
                "默认事件类型 {} 不可删除",
                option.name
            )));
        }

        let tx = conn.transaction()?;
        EventOptionRepository::delete_type_tx(&tx, owner_id, type_id)?;
        tx.commit()?;
        info!(owner_id, type_id, "事件类型已删除");
        Ok(())
    }

    /// 在事件类型下新增描述
    ///
    /// # 返回
    /// - Err(NotFound): 事件类型不存在或不属于该 owner
    /// - Err(Conflict): 该类型下已有相同描述
    pub fn add_event_description(
        &self,
        owner_id: i64,
        type_id: i64,
        description: &str,
    ) -> ApiResult<EventDescriptionOption> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ApiError::InvalidInput("事件描述不能为空".to_string()));
        }

        let mut conn = self.lock_seeded(owner_id)?;
        let parent = EventOptionRepository::find_type(&conn, owner_id, type_id)?
            .ok_or_else(|| ApiError::NotFound(format!("事件类型 {}", type_id)))?;
        if parent.descriptions.iter().any(|d| d.description == description) {
            return Err(ApiError::Conflict(format!(
                "事件类型 {} 下已有描述 {}",
                parent.name, description
            )));
        }

        let tx = conn.transaction()?;
        let description_id =
            EventOptionRepository::insert_description_tx(&tx, owner_id, type_id, description, false)?;
        tx.commit()?;

        EventOptionRepository::find_description(&conn, owner_id, description_id)?
            .ok_or_else(|| ApiError::NotFound(format!("事件描述 {}", description_id)))
    }

    /// 删除自定义事件描述（默认描述不可删除）
    pub fn delete_event_description(&self, owner_id: i64, description_id: i64) -> ApiResult<()> {
        let mut conn = self.lock_seeded(owner_id)?;
        let option = EventOptionRepository::find_description(&conn, owner_id, description_id)?
            .ok_or_else(|| ApiError::NotFound(format!("事件描述 {}", description_id)))?;
        if option.is_default {
            return Err(ApiError::InvalidInput(format!(
                "默认事件描述 {} 不可删除",
                option.description
            )));
        }

        let tx = conn.transaction()?;
        EventOptionRepository::delete_description_tx(&tx, owner_id, description_id)?;
        tx.commit()?;
        Ok(())
    }
}
