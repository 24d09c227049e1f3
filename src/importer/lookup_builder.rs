// ==========================================
// 羊群档案系统 - 对照表构建
// ==========================================
// 职责: 从品种/性别对照表构建 代码 → 名称 映射
// 约束: 只读工作簿；未配置 / 工作表缺失 / 列未映射 → 对照表为空
// ==========================================

use crate::config::mapping_config::{
    LookupKind, MappingConfig, LOOKUP_CODE_COLUMN, LOOKUP_NAME_COLUMN,
};
use crate::importer::workbook::ParsedWorkbook;
use std::collections::HashMap;
use tracing::debug;

// ==========================================
// LookupTables - 本次导入使用的对照表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub breed: HashMap<String, String>,
    pub sex: HashMap<String, String>,
}

impl LookupTables {
    /// 构建对照表
    ///
    /// # 说明
    /// - 同一种类配置多个表时合并，后出现的代码覆盖先出现的
    /// - 代码为空的行跳过；名称为空的行记为空名称（翻译结果为空，字段不写入）
    pub fn build(workbook: &ParsedWorkbook, config: &MappingConfig) -> Self {
        let mut tables = LookupTables::default();

        for (spec, kind) in config.lookup_sheets() {
            let table = match workbook.sheet(&spec.sheet_name) {
                Some(t) => t,
                None => {
                    debug!(sheet = %spec.sheet_name, "对照表不在工作簿中，跳过");
                    continue;
                }
            };

            let (code_col, name_col) = match (
                spec.column(LOOKUP_CODE_COLUMN),
                spec.column(LOOKUP_NAME_COLUMN),
            ) {
                (Some(c), Some(n)) => (c, n),
                _ => {
                    debug!(sheet = %spec.sheet_name, "对照表未映射 Code/Name 列，跳过");
                    continue;
                }
            };

            let target = tables.table_mut(kind);
            for row in table.records() {
                if let Some(code) = row.get(code_col) {
                    let name = row.get(name_col).unwrap_or_default();
                    target.insert(code.to_string(), name.to_string());
                }
            }
            debug!(sheet = %spec.sheet_name, ?kind, entries = target.len(), "对照表已构建");
        }

        tables
    }

    fn table_mut(&mut self, kind: LookupKind) -> &mut HashMap<String, String> {
        match kind {
            LookupKind::Breed => &mut self.breed,
            LookupKind::Sex => &mut self.sex,
        }
    }

    /// 代码翻译；未命中时原样返回，命中空名称时返回空串
    pub fn translate<'a>(&'a self, kind: LookupKind, raw: &'a str) -> &'a str {
        let table = match kind {
            LookupKind::Breed => &self.breed,
            LookupKind::Sex => &self.sex,
        };
        table.get(raw).map(String::as_str).unwrap_or(raw)
    }
}
