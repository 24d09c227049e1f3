// ==========================================
// 羊群档案系统 - 基础资料 upsert 阶段
// ==========================================
// 职责: 基础资料表逐行 → 按 (owner, 耳号) 新建或按字段更新羊只
// 规则:
// - 缺耳号的行跳过
// - Breed / Sex 经对照表翻译（未命中原样保留）
// - 日期字段规范化失败 → 该字段不写入
// - 数值字段解析失败 → 该字段不写入
// - 缺失值从不覆盖已有值
// 产出: 新建/更新计数 + 阶段结束后重建的身份缓存
// ==========================================

use crate::config::mapping_config::{
    LookupKind, MappingConfig, SheetPurpose, SheetSpec, EAR_NUM_COLUMN,
};
use crate::domain::{FieldValue, Sheep, SheepField};
use crate::importer::date_normalizer::normalize_date;
use crate::importer::error::{ImportResult, RowError};
use crate::importer::identity_cache::IdentityCache;
use crate::importer::lookup_builder::LookupTables;
use crate::importer::workbook::{ParsedWorkbook, RowView};
use crate::repository::SheepRepository;
use rusqlite::Transaction;
use serde::Serialize;
use tracing::{debug, info, warn};

/// 基础资料阶段统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BasicInfoSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// 基础资料阶段结果
#[derive(Debug)]
pub struct BasicInfoOutcome {
    /// 已处理的基础资料表名与统计；未配置或工作表缺失时为 None
    pub processed: Option<(String, BasicInfoSummary)>,
    pub cache: IdentityCache,
}

/// 执行基础资料 upsert
///
/// # 参数
/// - tx: 本次导入的事务
/// - cache: 上一阶段的身份缓存，只用于省去已知耳号的查询
///
/// # 返回
/// 阶段结束后在事务内全量重建的身份缓存
pub fn upsert_basic_info(
    tx: &Transaction,
    owner_id: i64,
    workbook: &ParsedWorkbook,
    config: &MappingConfig,
    lookups: &LookupTables,
    cache: IdentityCache,
) -> ImportResult<BasicInfoOutcome> {
    let spec = match config.basic_info_sheet() {
        Some(s) => s,
        None => {
            debug!("映射配置中没有基础资料表");
            return Ok(BasicInfoOutcome {
                processed: None,
                cache,
            });
        }
    };

    let ignored = config
        .sheets
        .iter()
        .filter(|s| s.purpose == SheetPurpose::BasicInfo)
        .skip(1)
        .map(|s| s.sheet_name.as_str())
        .collect::<Vec<_>>();
    if !ignored.is_empty() {
        warn!(used = %spec.sheet_name, ignored = ?ignored, "配置了多个基础资料表，只处理第一个");
    }

    let (table, ear_col) = match (workbook.sheet(&spec.sheet_name), spec.column(EAR_NUM_COLUMN)) {
        (Some(t), Some(c)) => (t, c),
        (None, _) => {
            debug!(sheet = %spec.sheet_name, "基础资料表不在工作簿中");
            return Ok(BasicInfoOutcome {
                processed: None,
                cache,
            });
        }
        (_, None) => {
            debug!(sheet = %spec.sheet_name, "基础资料表未映射 EarNum 列");
            return Ok(BasicInfoOutcome {
                processed: None,
                cache,
            });
        }
    };

    let mut summary = BasicInfoSummary::default();

    for row in table.records() {
        let ear_num = match row.get(ear_col) {
            Some(e) => e,
            None => {
                let err = RowError::MissingEarNum {
                    row: row.row_number,
                };
                debug!(error = %err, "跳过行");
                summary.skipped += 1;
                continue;
            }
        };

        let fields = collect_fields(spec, &row, lookups);

        // 缓存只是提示；缓存未命中时仍需查询（同一批次中前面的行可能刚新建）
        let existing_id = match cache.resolve(ear_num) {
            Some(id) => Some(id),
            None => SheepRepository::find_by_ear_num(tx, owner_id, ear_num)?.map(|s| s.id),
        };

        match existing_id {
            Some(sheep_id) => {
                SheepRepository::update_fields_tx(tx, sheep_id, &fields)?;
                summary.updated += 1;
            }
            None => {
                let mut sheep = Sheep::new(owner_id, ear_num);
                for (field, value) in fields {
                    sheep.set(field, value);
                }
                SheepRepository::insert_tx(tx, &sheep)?;
                summary.created += 1;
            }
        }
    }

    let cache = IdentityCache::materialize(tx, owner_id)?;

    info!(
        sheet = %spec.sheet_name,
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped,
        known_sheep = cache.len(),
        "基础资料处理完成"
    );

    Ok(BasicInfoOutcome {
        processed: Some((spec.sheet_name.clone(), summary)),
        cache,
    })
}

/// 单行 → 待写入字段列表（只含存在且可解析的值）
fn collect_fields(
    spec: &SheetSpec,
    row: &RowView<'_>,
    lookups: &LookupTables,
) -> Vec<(SheepField, FieldValue)> {
    let mut fields = Vec::new();

    for (logical, source_col) in &spec.column_map {
        let field = match SheepField::from_name(logical) {
            Some(SheepField::EarNum) | None => continue,
            Some(f) => f,
        };
        let raw = match row.get(source_col) {
            Some(v) => v,
            None => continue,
        };

        let text = match field {
            SheepField::Breed => lookups.translate(LookupKind::Breed, raw).to_string(),
            SheepField::Sex => lookups.translate(LookupKind::Sex, raw).to_string(),
            f if f.is_date() => match normalize_date(raw) {
                Some(d) => d,
                None => {
                    debug!(row = row.row_number, field = %f, raw, "日期无法识别，字段不写入");
                    continue;
                }
            },
            _ => raw.to_string(),
        };

        match FieldValue::parse(field.kind(), &text) {
            Ok(Some(value)) => fields.push((field, value)),
            Ok(None) => {}
            Err(_) => {
                let err = RowError::Parse {
                    row: row.row_number,
                    field: field.name().to_string(),
                    value: Some(text),
                };
                debug!(error = %err, "字段不写入");
            }
        }
    }

    fields
}
