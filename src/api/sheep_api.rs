// ==========================================
// 羊群档案系统 - 羊只维护 API
// ==========================================
// 职责: 羊只主档 / 事件 / 历史数据 / 对话记录的直接维护
// 约束:
// - 所有操作限定 owner，跨 owner 访问一律 NotFound
// - 空值从不覆盖已有值；耳号不可修改
// - 体重 / 日产奶量 / 乳脂率 变化时追加历史数据点
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::{
    ChatMessage, FieldValue, HistoricalDataPoint, NewHistoricalDataPoint, NewSheepEvent, Sheep,
    SheepEvent, SheepField,
};
use crate::importer::normalize_date;
use crate::repository::{
    ChatHistoryRepository, HistoricalDataRepository, SheepEventRepository, SheepRepository,
};
use chrono::Local;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// 详情页附带的最近事件条数
const DETAIL_EVENT_LIMIT: usize = 10;

// ==========================================
// 请求 / 响应类型
// ==========================================

/// 新建羊只
///
/// JSON 形态为扁平对象；字段值可以是字符串、数字或布尔，null 视为未提供
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>")]
pub struct SheepInput {
    #[serde(rename = "EarNum")]
    pub ear_num: String,
    /// 字段名 → 文本值
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// 更新羊只
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>")]
pub struct SheepUpdate {
    /// 历史数据点日期（缺省为今天）
    #[serde(default)]
    pub record_date: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// JSON 标量 → 文本（null 为 None，数组 / 对象报错）
fn scalar_text(key: &str, value: Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(format!("字段 {} 必须是标量值", key)),
    }
}

fn scalar_fields(raw: BTreeMap<String, Value>) -> Result<BTreeMap<String, String>, String> {
    let mut fields = BTreeMap::new();
    for (key, value) in raw {
        if let Some(text) = scalar_text(&key, value)? {
            fields.insert(key, text);
        }
    }
    Ok(fields)
}

impl TryFrom<BTreeMap<String, Value>> for SheepInput {
    type Error = String;

    fn try_from(mut raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let ear_num = raw
            .remove("EarNum")
            .map(|v| scalar_text("EarNum", v))
            .transpose()?
            .flatten()
            .ok_or_else(|| "缺少 EarNum".to_string())?;
        Ok(Self {
            ear_num,
            fields: scalar_fields(raw)?,
        })
    }
}

impl TryFrom<BTreeMap<String, Value>> for SheepUpdate {
    type Error = String;

    fn try_from(mut raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let record_date = match raw.remove("record_date") {
            Some(v) => scalar_text("record_date", v)?,
            None => None,
        };
        Ok(Self {
            record_date,
            fields: scalar_fields(raw)?,
        })
    }
}

/// 新建 / 修改事件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventInput {
    pub event_date: String,
    pub event_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 羊只详情
#[derive(Debug, Clone, Serialize)]
pub struct SheepDetail {
    #[serde(flatten)]
    pub sheep: Sheep,
    pub events: Vec<SheepEvent>,
}

// ==========================================
// SheepApi - 羊只维护 API
// ==========================================
pub struct SheepApi {
    conn: Arc<Mutex<Connection>>,
}

impl SheepApi {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    fn require_sheep(conn: &Connection, owner_id: i64, ear_num: &str) -> ApiResult<Sheep> {
        SheepRepository::find_by_ear_num(conn, owner_id, ear_num)?
            .ok_or_else(|| ApiError::NotFound(format!("耳号 {}", ear_num)))
    }

    // ==========================================
    // 羊只主档
    // ==========================================

    /// 新建羊只
    ///
    /// # 返回
    /// - Err(InvalidInput): 耳号为空 / 字段名未知 / 值无法解析
    /// - Err(Conflict): 耳号已存在
    pub fn create_sheep(&self, owner_id: i64, input: &SheepInput) -> ApiResult<Sheep> {
        let ear_num = input.ear_num.trim();
        if ear_num.is_empty() {
            return Err(ApiError::InvalidInput("EarNum 为必填字段".to_string()));
        }

        let mut sheep = Sheep::new(owner_id, ear_num);
        for (field, value) in parse_field_inputs(&input.fields)? {
            sheep.set(field, value);
        }

        let mut conn = self.lock()?;
        if SheepRepository::find_by_ear_num(&conn, owner_id, ear_num)?.is_some() {
            return Err(ApiError::Conflict(format!("耳号 {} 已存在", ear_num)));
        }

        let tx = conn.transaction()?;
        SheepRepository::insert_tx(&tx, &sheep)?;
        tx.commit()?;

        info!(owner_id, ear_num, "羊只已新建");
        Self::require_sheep(&conn, owner_id, ear_num)
    }

    /// 查询 owner 的全部羊只（耳号升序）
    pub fn list_sheep(&self, owner_id: i64) -> ApiResult<Vec<Sheep>> {
        let conn = self.lock()?;
        Ok(SheepRepository::list_by_owner(&conn, owner_id)?)
    }

    /// 羊只详情 + 最近事件
    pub fn get_sheep_detail(&self, owner_id: i64, ear_num: &str) -> ApiResult<SheepDetail> {
        let conn = self.lock()?;
        let sheep = Self::require_sheep(&conn, owner_id, ear_num)?;
        let events = SheepEventRepository::list_by_sheep(&conn, sheep.id, Some(DETAIL_EVENT_LIMIT))?;
        Ok(SheepDetail { sheep, events })
    }

    /// 更新羊只字段
    ///
    /// # 说明
    /// - 空值忽略（不清空已有值）
    /// - 跟踪字段的新值与旧值数值不同（或旧值缺失）时追加历史数据点；
    ///   任一侧无法作为数值比较时不追加
    pub fn update_sheep(
        &self,
        owner_id: i64,
        ear_num: &str,
        update: &SheepUpdate,
    ) -> ApiResult<Sheep> {
        let record_date = match update.record_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => normalize_date(raw)
                .ok_or_else(|| ApiError::InvalidInput(format!("无法识别的日期: {}", raw)))?,
            _ => Local::now().date_naive().format("%Y-%m-%d").to_string(),
        };
        let fields = parse_field_inputs(&update.fields)?;

        let mut conn = self.lock()?;
        let sheep = Self::require_sheep(&conn, owner_id, ear_num)?;

        let tx = conn.transaction()?;
        SheepRepository::update_fields_tx(&tx, sheep.id, &fields)?;

        for (field, new_value) in &fields {
            let metric = match field.tracked_metric() {
                Some(m) => m,
                None => continue,
            };
            let new_num = match new_value.as_f64() {
                Some(n) => n,
                None => continue,
            };
            let old_value = sheep.get(*field);
            let changed = match old_value.map(FieldValue::as_f64) {
                None => true,
                Some(Some(old_num)) => old_num != new_num,
                Some(None) => {
                    debug!(field = %field, "旧值不是数值，跳过历史比较");
                    false
                }
            };
            if !changed {
                continue;
            }

            let notes = match old_value {
                Some(old) => format!("updated from {} to {}", old, new_value),
                None => format!("set to {}", new_value),
            };
            HistoricalDataRepository::insert_tx(
                &tx,
                &NewHistoricalDataPoint {
                    owner_id,
                    sheep_id: sheep.id,
                    record_date: record_date.clone(),
                    metric: metric.as_str().to_string(),
                    value: new_num,
                    notes: Some(notes),
                },
            )?;
        }
        tx.commit()?;

        info!(owner_id, ear_num, fields = fields.len(), "羊只已更新");
        Self::require_sheep(&conn, owner_id, ear_num)
    }

    /// 删除羊只（级联删除事件与历史数据）
    pub fn delete_sheep(&self, owner_id: i64, ear_num: &str) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let affected = SheepRepository::delete_tx(&tx, owner_id, ear_num)?;
        if affected == 0 {
            return Err(ApiError::NotFound(format!("耳号 {}", ear_num)));
        }
        tx.commit()?;
        info!(owner_id, ear_num, "羊只已删除");
        Ok(())
    }

    // ==========================================
    // 事件
    // ==========================================

    pub fn add_event(&self, owner_id: i64, ear_num: &str, input: &EventInput) -> ApiResult<SheepEvent> {
        let (event_date, event_type) = validate_event(input)?;

        let mut conn = self.lock()?;
        let sheep = Self::require_sheep(&conn, owner_id, ear_num)?;

        let tx = conn.transaction()?;
        let event_id = SheepEventRepository::insert_tx(
            &tx,
            &NewSheepEvent {
                owner_id,
                sheep_id: sheep.id,
                event_date,
                event_type,
                description: non_empty(input.description.as_deref()),
                notes: non_empty(input.notes.as_deref()),
            },
        )?;
        tx.commit()?;

        SheepEventRepository::find_by_id(&conn, owner_id, event_id)?
            .ok_or_else(|| ApiError::NotFound(format!("事件 {}", event_id)))
    }

    /// 羊只的全部事件（日期倒序）
    pub fn list_events(&self, owner_id: i64, ear_num: &str) -> ApiResult<Vec<SheepEvent>> {
        let conn = self.lock()?;
        let sheep = Self::require_sheep(&conn, owner_id, ear_num)?;
        Ok(SheepEventRepository::list_by_sheep(&conn, sheep.id, None)?)
    }

    pub fn update_event(&self, owner_id: i64, event_id: i64, input: &EventInput) -> ApiResult<SheepEvent> {
        let (event_date, event_type) = validate_event(input)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let affected = SheepEventRepository::update_tx(
            &tx,
            owner_id,
            event_id,
            &event_date,
            &event_type,
            non_empty(input.description.as_deref()).as_deref(),
            non_empty(input.notes.as_deref()).as_deref(),
        )?;
        if affected == 0 {
            return Err(ApiError::NotFound(format!("事件 {}", event_id)));
        }
        tx.commit()?;

        SheepEventRepository::find_by_id(&conn, owner_id, event_id)?
            .ok_or_else(|| ApiError::NotFound(format!("事件 {}", event_id)))
    }

    pub fn delete_event(&self, owner_id: i64, event_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if SheepEventRepository::delete_tx(&tx, owner_id, event_id)? == 0 {
            return Err(ApiError::NotFound(format!("事件 {}", event_id)));
        }
        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 历史数据
    // ==========================================

    /// 羊只的全部历史数据（日期升序）
    pub fn list_history(&self, owner_id: i64, ear_num: &str) -> ApiResult<Vec<HistoricalDataPoint>> {
        let conn = self.lock()?;
        let sheep = Self::require_sheep(&conn, owner_id, ear_num)?;
        Ok(HistoricalDataRepository::list_by_sheep(&conn, sheep.id)?)
    }

    pub fn delete_history(&self, owner_id: i64, record_id: i64) -> ApiResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if HistoricalDataRepository::delete_tx(&tx, owner_id, record_id)? == 0 {
            return Err(ApiError::NotFound(format!("历史数据 {}", record_id)));
        }
        tx.commit()?;
        Ok(())
    }

    // ==========================================
    // 对话记录
    // ==========================================

    /// 保存一轮对话（用户消息 + 助手回复）
    pub fn save_chat_exchange(
        &self,
        owner_id: i64,
        session_id: &str,
        ear_num_context: Option<&str>,
        user_message: &str,
        model_reply: &str,
    ) -> ApiResult<()> {
        if session_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("session_id 不能为空".to_string()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        ChatHistoryRepository::insert_tx(&tx, owner_id, session_id, "user", user_message, ear_num_context)?;
        ChatHistoryRepository::insert_tx(&tx, owner_id, session_id, "model", model_reply, ear_num_context)?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_chat_history(&self, owner_id: i64) -> ApiResult<Vec<ChatMessage>> {
        let conn = self.lock()?;
        Ok(ChatHistoryRepository::list_by_owner(&conn, owner_id)?)
    }
}

// ==========================================
// 输入解析
// ==========================================

/// 字段名 → 文本 解析为待写入字段（空值跳过）
fn parse_field_inputs(inputs: &BTreeMap<String, String>) -> ApiResult<Vec<(SheepField, FieldValue)>> {
    let mut fields = Vec::with_capacity(inputs.len());

    for (name, raw) in inputs {
        let field = SheepField::from_name(name)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知字段: {}", name)))?;
        if field == SheepField::EarNum {
            return Err(ApiError::InvalidInput("EarNum 不可修改".to_string()));
        }

        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let text = if field.is_date() {
            normalize_date(raw)
                .ok_or_else(|| ApiError::InvalidInput(format!("{}: 无法识别的日期 {}", name, raw)))?
        } else {
            raw.to_string()
        };

        if let Some(value) = FieldValue::parse(field.kind(), &text)
            .map_err(|e| ApiError::InvalidInput(format!("{}: {}", name, e)))?
        {
            fields.push((field, value));
        }
    }

    Ok(fields)
}

/// 事件日期与类型必填；日期规范化为 YYYY-MM-DD
fn validate_event(input: &EventInput) -> ApiResult<(String, String)> {
    let event_type = input.event_type.trim();
    if input.event_date.trim().is_empty() || event_type.is_empty() {
        return Err(ApiError::InvalidInput("事件日期和类型为必填".to_string()));
    }
    let event_date = normalize_date(&input.event_date).ok_or_else(|| {
        ApiError::InvalidInput(format!("无法识别的事件日期: {}", input.event_date))
    })?;
    Ok((event_date, event_type.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
