// ==========================================
// 羊群档案系统 - 配置层
// ==========================================
// 职责: 导入映射配置（默认 / 自定义）与映射方案持久化
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod mapping_config;

// 重导出核心配置类型
pub use config_manager::ConfigManager;
pub use mapping_config::{
    default_mapping_config, default_mapping_json, LookupKind, MappingConfig, SheetPurpose,
    SheetSpec, DEFAULT_MAPPING_VERSION, EAR_NUM_COLUMN, LOOKUP_CODE_COLUMN, LOOKUP_NAME_COLUMN,
};
