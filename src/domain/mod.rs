// ==========================================
// 羊群档案系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、字段目录、基础类型
// 红线: 不含数据访问逻辑,不含导入逻辑
// ==========================================

pub mod event_option;
pub mod record;
pub mod sheep;
pub mod types;

// 重导出核心类型
pub use event_option::{EventDescriptionOption, EventTypeOption, DEFAULT_EVENT_OPTIONS};
pub use record::{
    ChatMessage, HistoricalDataPoint, NewHistoricalDataPoint, NewSheepEvent, SheepEvent,
};
pub use sheep::{Sheep, SheepField};
pub use types::{EventKind, FieldKind, FieldValue, Metric};
