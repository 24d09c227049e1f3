// ==========================================
// 羊群档案系统 - 事件下拉选项
// ==========================================
// 职责: owner 自定义的事件类型 / 事件描述候选项
// 约束:
// - 同一 owner 下事件类型名唯一；同一类型下描述唯一
// - 默认选项（is_default）不可删除
// ==========================================

use serde::{Deserialize, Serialize};

/// 事件类型选项（附带其描述选项）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTypeOption {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub is_default: bool,
    pub descriptions: Vec<EventDescriptionOption>,
}

/// 事件描述选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptionOption {
    pub id: i64,
    pub owner_id: i64,
    pub event_type_option_id: i64,
    pub description: String,
    pub is_default: bool,
}

/// 新 owner 的默认选项: (事件类型, 描述列表)
pub const DEFAULT_EVENT_OPTIONS: &[(&str, &[&str])] = &[
    ("疫苗接种", &["口蹄疫疫苗", "炭疽病疫苗", "破伤风类毒素"]),
    ("疾病治疗", &["盘尼西林注射", "抗生素治疗", "消炎药"]),
    ("配种", &["自然配种", "人工授精"]),
    ("产仔", &["单胎", "双胎", "三胎以上"]),
    ("体重记录", &[]),
    ("饲料调整", &["更换精料", "增加草料", "补充矿物质"]),
    ("驱虫", &["内寄生虫 (口服)", "外寄生虫 (喷洒)"]),
    ("特殊观察", &["食欲不振", "跛行", "精神沉郁"]),
    ("AI饲养建议咨询", &[]),
    ("其他", &[]),
];
