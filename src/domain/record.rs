// ==========================================
// 羊群档案系统 - 派生记录领域模型
// ==========================================
// 职责: 事件日志 / 历史数据点 / 聊天记录
// 约束: 事件与历史数据均归属唯一羊只与唯一 owner
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// SheepEvent - 羊只事件
// ==========================================
// 导入层只追加，不更新
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheepEvent {
    pub id: i64,
    pub owner_id: i64,
    pub sheep_id: i64,
    pub event_date: String, // YYYY-MM-DD
    pub event_type: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// 待写入的事件（尚无 id）
#[derive(Debug, Clone, PartialEq)]
pub struct NewSheepEvent {
    pub owner_id: i64,
    pub sheep_id: i64,
    pub event_date: String,
    pub event_type: String,
    pub description: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// HistoricalDataPoint - 历史数据点
// ==========================================
// 同一 (sheep, metric) 可在不同日期有多个点，构成时间序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDataPoint {
    pub id: i64,
    pub owner_id: i64,
    pub sheep_id: i64,
    pub record_date: String,
    pub metric: String,
    pub value: f64,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoricalDataPoint {
    pub owner_id: i64,
    pub sheep_id: i64,
    pub record_date: String,
    pub metric: String,
    pub value: f64,
    pub notes: Option<String>,
}

// ==========================================
// ChatMessage - 助手对话记录
// ==========================================
// 对本引擎不透明，仅随导出输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub owner_id: i64,
    pub session_id: String,
    pub role: String, // "user" / "model"
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub ear_num_context: Option<String>,
}
