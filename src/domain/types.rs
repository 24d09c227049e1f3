// ==========================================
// 羊群档案系统 - 领域类型定义
// ==========================================
// 职责: 字段值、字段类型、历史指标等基础类型
// ==========================================

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 字段类型 (Field Kind)
// ==========================================
// 决定原始文本如何转换为存储值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,    // 文本
    Date,    // 日期文本（YYYY-MM-DD）
    Float,   // 浮点数
    Integer, // 整数
}

// ==========================================
// 字段值 (Field Value)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// 按字段类型把文本转换为字段值
    ///
    /// # 返回
    /// - Ok(None): 文本为空（空串视为缺失）
    /// - Ok(Some(v)): 转换成功
    /// - Err(msg): 数值无法解析
    pub fn parse(kind: FieldKind, raw: &str) -> Result<Option<FieldValue>, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        match kind {
            FieldKind::Text | FieldKind::Date => Ok(Some(FieldValue::Text(trimmed.to_string()))),
            FieldKind::Float => parse_finite_f64(trimmed).map(|v| Some(FieldValue::Float(v))),
            FieldKind::Integer => {
                if let Ok(v) = trimmed.parse::<i64>() {
                    return Ok(Some(FieldValue::Integer(v)));
                }
                // 表格中的整数常以 "3.0" 形式出现
                let v = parse_finite_f64(trimmed)?;
                if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
                    Ok(Some(FieldValue::Integer(v as i64)))
                } else {
                    Err(format!("无法解析为整数: {}", trimmed))
                }
            }
        }
    }

    /// 按字段类型修正从数据库读出的值（SQLite 类型亲和性可能改变存储类型）
    pub fn conform(self, kind: FieldKind) -> FieldValue {
        match (kind, self) {
            (FieldKind::Float, FieldValue::Integer(n)) => FieldValue::Float(n as f64),
            (FieldKind::Text | FieldKind::Date, FieldValue::Integer(n)) => {
                FieldValue::Text(n.to_string())
            }
            (FieldKind::Text | FieldKind::Date, FieldValue::Float(n)) => {
                FieldValue::Text(n.to_string())
            }
            (_, v) => v,
        }
    }

    /// 数值视图（文本尝试解析）
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(n) => Some(*n as f64),
            FieldValue::Float(n) => Some(*n),
            FieldValue::Text(s) => parse_finite_f64(s.trim()).ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Float(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Integer(n) => ToSqlOutput::from(*n),
            FieldValue::Float(n) => ToSqlOutput::from(*n),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for FieldValue {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(FieldValue::Integer(n)),
            ValueRef::Real(n) => Ok(FieldValue::Float(n)),
            ValueRef::Text(_) => value.as_str().map(|s| FieldValue::Text(s.to_string())),
            ValueRef::Null | ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

/// 解析有限浮点数（NaN / inf 视为解析失败，SQLite 会把 NaN 存为 NULL）
pub fn parse_finite_f64(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("无法解析为浮点数: {}", raw)),
    }
}

// ==========================================
// 历史数据指标 (Metric)
// ==========================================
// 导入派生与直接更新共用同一套指标名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    BodyWeight, // 体重（kg）
    MilkYield,  // 日产奶量（kg/日）
    MilkFat,    // 乳脂率（%）
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::BodyWeight => "body_weight",
            Metric::MilkYield => "milk_yield",
            Metric::MilkFat => "milk_fat",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 事件类型 (Event Kind)
// ==========================================
// 导入派生产生的固定事件类型；手工录入的事件类型为自由文本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Kidding,        // 产仔
    Mating,         // 配种
    LactationStart, // 泌乳开始
    DryOff,         // 干乳
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Kidding => "kidding",
            EventKind::Mating => "mating",
            EventKind::LactationStart => "lactation-start",
            EventKind::DryOff => "dry-off",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
