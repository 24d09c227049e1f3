// ==========================================
// 羊群档案系统 - API 层
// ==========================================
// 职责: 对外业务接口（供 HTTP 层 / 命令行调用）
// ==========================================

pub mod data_api;
pub mod error;
pub mod event_option_api;
pub mod sheep_api;

// 重导出核心类型
pub use data_api::DataApi;
pub use error::{ApiError, ApiResult};
pub use event_option_api::EventOptionApi;
pub use sheep_api::{EventInput, SheepApi, SheepDetail, SheepInput, SheepUpdate};
