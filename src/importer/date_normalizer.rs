// ==========================================
// 羊群档案系统 - 日期规范化
// ==========================================
// 职责: 任意单元格文本 → "YYYY-MM-DD" 或缺失
// 约束: 从不报错；无法识别 / 早于 1901 年 均视为缺失
// ==========================================

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// 早于此年份的日期视为占位值（表格软件的零日期）
const MIN_VALID_YEAR: i32 = 1901;

/// 日期格式优先级（先 ISO，后本地化写法）
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", // 2024-01-15
    "%Y/%m/%d", // 2024/01/15
    "%Y.%m.%d", // 2024.01.15
    "%Y%m%d",   // 20240115
    "%m/%d/%Y", // 01/15/2024
    "%m-%d-%Y", // 01-15-2024
    "%d.%m.%Y", // 15.01.2024
    "%Y年%m月%d日",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// 规范化日期文本
///
/// # 规则
/// 1. 去空白，空串 → None
/// 2. 截取第一个空格之前的部分（丢弃时间部分）
/// 3. 依次尝试已知格式
/// 4. 年份 < 1901 → None
pub fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let date_part = trimmed.split(' ').next().unwrap_or(trimmed);

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(date_part, fmt).ok())
                .map(|dt| dt.date())
        })?;

    if parsed.year() < MIN_VALID_YEAR {
        return None;
    }

    Some(parsed.format("%Y-%m-%d").to_string())
}
