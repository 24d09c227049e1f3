// ==========================================
// 羊群档案系统 - 派生记录合成阶段
// ==========================================
// 职责: 非基础资料表逐行 → 事件 / 历史数据点（只追加）
// 分发: 用途 → 行处理函数 的静态表；表中没有的用途为空操作
// 规则:
// - 工作表缺失 / 未映射 EarNum → 整表跳过
// - 耳号不在身份缓存中 → 该行跳过（不隐式新建羊只）
// - 行处理函数返回 RowError → 该行跳过
// - 存储错误 → 终止整个导入
// ==========================================

use crate::config::mapping_config::{MappingConfig, SheetPurpose, SheetSpec, EAR_NUM_COLUMN};
use crate::domain::types::parse_finite_f64;
use crate::domain::{EventKind, Metric, NewHistoricalDataPoint, NewSheepEvent};
use crate::importer::date_normalizer::normalize_date;
use crate::importer::error::{ImportResult, RowError};
use crate::importer::identity_cache::IdentityCache;
use crate::importer::workbook::{ParsedWorkbook, RowView};
use crate::repository::{HistoricalDataRepository, SheepEventRepository};
use rusqlite::Transaction;
use tracing::{debug, info};

// ==========================================
// 派生记录
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedRecord {
    Event(NewSheepEvent),
    History(NewHistoricalDataPoint),
}

/// 行处理上下文
pub struct RowContext<'a> {
    pub spec: &'a SheetSpec,
    pub owner_id: i64,
    pub sheep_id: i64,
}

impl RowContext<'_> {
    fn event(&self, date: String, kind: &str, description: Option<String>) -> DerivedRecord {
        DerivedRecord::Event(NewSheepEvent {
            owner_id: self.owner_id,
            sheep_id: self.sheep_id,
            event_date: date,
            event_type: kind.to_string(),
            description,
            notes: None,
        })
    }

    fn history(&self, date: String, metric: &str, value: f64) -> DerivedRecord {
        DerivedRecord::History(NewHistoricalDataPoint {
            owner_id: self.owner_id,
            sheep_id: self.sheep_id,
            record_date: date,
            metric: metric.to_string(),
            value,
            notes: None,
        })
    }

    /// 按逻辑字段取值
    fn value<'r>(&self, row: &RowView<'r>, logical: &str) -> Option<&'r str> {
        row.get_opt(self.spec.column(logical))
    }

    /// 按逻辑字段取规范化日期；缺失或无法识别 → RowError::Parse
    fn required_date(&self, row: &RowView<'_>, logical: &str) -> Result<String, RowError> {
        let raw = self.value(row, logical);
        raw.and_then(normalize_date).ok_or_else(|| RowError::Parse {
            row: row.row_number,
            field: logical.to_string(),
            value: raw.map(str::to_string),
        })
    }

    fn required_float(&self, row: &RowView<'_>, logical: &str) -> Result<f64, RowError> {
        let raw = self.value(row, logical);
        raw.and_then(|v| parse_finite_f64(v).ok())
            .ok_or_else(|| RowError::Parse {
                row: row.row_number,
                field: logical.to_string(),
                value: raw.map(str::to_string),
            })
    }

    fn required_text(&self, row: &RowView<'_>, logical: &str) -> Result<String, RowError> {
        self.value(row, logical)
            .map(str::to_string)
            .ok_or_else(|| RowError::Parse {
                row: row.row_number,
                field: logical.to_string(),
                value: None,
            })
    }
}

type RowHandler = fn(&RowContext<'_>, &RowView<'_>) -> Result<Vec<DerivedRecord>, RowError>;

/// 用途 → 行处理函数
const ROW_HANDLERS: &[(SheetPurpose, RowHandler)] = &[
    (SheetPurpose::KiddingRecord, derive_kidding),
    (SheetPurpose::MatingRecord, derive_mating),
    (SheetPurpose::YeanRecord, derive_yean),
    (SheetPurpose::WeightRecord, derive_weight),
    (SheetPurpose::MilkYieldRecord, derive_milk_yield),
    (SheetPurpose::MilkAnalysisRecord, derive_milk_fat),
    (SheetPurpose::EventLog, derive_event_log),
    (SheetPurpose::HistoryLog, derive_history_log),
];

fn handler_for(purpose: SheetPurpose) -> Option<RowHandler> {
    ROW_HANDLERS
        .iter()
        .find(|(p, _)| *p == purpose)
        .map(|(_, h)| *h)
}

// ===== 行处理函数 =====

fn derive_kidding(ctx: &RowContext<'_>, row: &RowView<'_>) -> Result<Vec<DerivedRecord>, RowError> {
    let date = ctx.required_date(row, "YeanDate")?;
    let description = ctx.value(row, "KidNum").map(|kid| format!("Kid: {}", kid));
    Ok(vec![ctx.event(date, EventKind::Kidding.as_str(), description)])
}

fn derive_mating(ctx: &RowContext<'_>, row: &RowView<'_>) -> Result<Vec<DerivedRecord>, RowError> {
    let date = ctx.required_date(row, "Mat_date")?;
    let description = ctx
        .value(row, "Mat_grouM_Sire")
        .map(|sire| format!("Sire: {}", sire));
    Ok(vec![ctx.event(date, EventKind::Mating.as_str(), description)])
}

/// 泌乳开始与干乳各自独立判断，最多产生两条事件
fn derive_yean(ctx: &RowContext<'_>, row: &RowView<'_>) -> Result<Vec<DerivedRecord>, RowError> {
    let lactation = ctx.value(row, "Lactation");
    let mut records = Vec::with_capacity(2);

    if let Some(date) = ctx.value(row, "YeanDate").and_then(normalize_date) {
        records.push(ctx.event(
            date,
            EventKind::LactationStart.as_str(),
            lactation.map(|n| format!("Lactation {}", n)),
        ));
    }
    if let Some(date) = ctx.value(row, "DryOffDate").and_then(normalize_date) {
        records.push(ctx.event(
            date,
            EventKind::DryOff.as_str(),
            lactation.map(|n| format!("Lactation {} ended", n)),
        ));
    }

    Ok(records)
}

fn derive_measurement(
    ctx: &RowContext<'_>,
    row: &RowView<'_>,
    value_column: &str,
    metric: Metric,
) -> Result<Vec<DerivedRecord>, RowError> {
    let date = ctx.required_date(row, "MeaDate")?;
    let value = ctx.required_float(row, value_column)?;
    Ok(vec![ctx.history(date, metric.as_str(), value)])
}

fn derive_weight(ctx: &RowContext<'_>, row: &RowView<'_>) -> Result<Vec<DerivedRecord>, RowError> {
    derive_measurement(ctx, row, "Weight", Metric::BodyWeight)
}

fn derive_milk_yield(
    ctx: &RowContext<'_>,
    row: &RowView<'_>,
) -> Result<Vec<DerivedRecord>, RowError> {
    derive_measurement(ctx, row, "Milk", Metric::MilkYield)
}

fn derive_milk_fat(ctx: &RowContext<'_>, row: &RowView<'_>) -> Result<Vec<DerivedRecord>, RowError> {
    derive_measurement(ctx, row, "AMFat", Metric::MilkFat)
}

fn derive_event_log(
    ctx: &RowContext<'_>,
    row: &RowView<'_>,
) -> Result<Vec<DerivedRecord>, RowError> {
    let date = ctx.required_date(row, "event_date")?;
    let event_type = ctx.required_text(row, "event_type")?;
    let mut record = ctx.event(
        date,
        &event_type,
        ctx.value(row, "description").map(str::to_string),
    );
    if let DerivedRecord::Event(event) = &mut record {
        event.notes = ctx.value(row, "notes").map(str::to_string);
    }
    Ok(vec![record])
}

fn derive_history_log(
    ctx: &RowContext<'_>,
    row: &RowView<'_>,
) -> Result<Vec<DerivedRecord>, RowError> {
    let date = ctx.required_date(row, "record_date")?;
    let metric = ctx.required_text(row, "record_type")?;
    let value = ctx.required_float(row, "value")?;
    let mut record = ctx.history(date, &metric, value);
    if let DerivedRecord::History(point) = &mut record {
        point.notes = ctx.value(row, "notes").map(str::to_string);
    }
    Ok(vec![record])
}

// ==========================================
// 阶段入口
// ==========================================

/// 单个工作表的派生结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSheetCount {
    pub sheet_name: String,
    pub records: usize,
}

/// 执行派生记录合成
///
/// # 返回
/// 每个至少写入一条记录的工作表一项，顺序与配置中的表顺序一致
pub fn synthesize_derived_records(
    tx: &Transaction,
    owner_id: i64,
    workbook: &ParsedWorkbook,
    config: &MappingConfig,
    cache: &IdentityCache,
) -> ImportResult<Vec<DerivedSheetCount>> {
    let mut counts = Vec::new();

    for spec in config.derived_sheets() {
        let handler = match handler_for(spec.purpose) {
            Some(h) => h,
            None => {
                debug!(sheet = %spec.sheet_name, purpose = ?spec.purpose, "用途无对应处理，跳过");
                continue;
            }
        };
        let table = match workbook.sheet(&spec.sheet_name) {
            Some(t) => t,
            None => {
                debug!(sheet = %spec.sheet_name, "工作表不在工作簿中，跳过");
                continue;
            }
        };
        let ear_col = match spec.column(EAR_NUM_COLUMN) {
            Some(c) => c,
            None => {
                debug!(sheet = %spec.sheet_name, "未映射 EarNum 列，跳过");
                continue;
            }
        };

        let mut written = 0usize;
        let mut unknown_ear = 0usize;
        for row in table.records() {
            let sheep_id = match row.get(ear_col).and_then(|ear| cache.resolve(ear)) {
                Some(id) => id,
                None => {
                    unknown_ear += 1;
                    continue;
                }
            };

            let ctx = RowContext {
                spec,
                owner_id,
                sheep_id,
            };
            let records = match handler(&ctx, &row) {
                Ok(r) => r,
                Err(err) => {
                    debug!(sheet = %spec.sheet_name, error = %err, "跳过行");
                    continue;
                }
            };

            for record in &records {
                match record {
                    DerivedRecord::Event(event) => {
                        SheepEventRepository::insert_tx(tx, event)?;
                    }
                    DerivedRecord::History(point) => {
                        HistoricalDataRepository::insert_tx(tx, point)?;
                    }
                }
            }
            written += records.len();
        }

        info!(
            sheet = %spec.sheet_name,
            purpose = ?spec.purpose,
            records = written,
            unknown_ear,
            "派生记录处理完成"
        );

        if written > 0 {
            counts.push(DerivedSheetCount {
                sheet_name: spec.sheet_name.clone(),
                records: written,
            });
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::workbook::SheetTable;

    fn cell(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn run(
        purpose: SheetPurpose,
        columns: &[(&str, &str)],
        headers: &[&str],
        cells: Vec<Option<String>>,
    ) -> Result<Vec<DerivedRecord>, RowError> {
        let spec = SheetSpec::new("S", purpose, columns);
        let table = SheetTable::new(
            "S",
            headers.iter().map(|h| h.to_string()).collect(),
            vec![cells],
        );
        let row = table.records().next().unwrap();
        let ctx = RowContext {
            spec: &spec,
            owner_id: 1,
            sheep_id: 7,
        };
        let handler = handler_for(purpose).unwrap();
        handler(&ctx, &row)
    }

    #[test]
    fn test_kidding_with_description() {
        let records = run(
            SheetPurpose::KiddingRecord,
            &[("EarNum", "EarNum"), ("YeanDate", "YeanDate"), ("KidNum", "KidNum")],
            &["EarNum", "YeanDate", "KidNum"],
            vec![cell("G001"), cell("2024-01-10"), cell("K9")],
        )
        .unwrap();
        match &records[0] {
            DerivedRecord::Event(e) => {
                assert_eq!(e.event_type, "kidding");
                assert_eq!(e.event_date, "2024-01-10");
                assert_eq!(e.description.as_deref(), Some("Kid: K9"));
                assert_eq!(e.sheep_id, 7);
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_kidding_without_date_is_row_error() {
        let result = run(
            SheetPurpose::KiddingRecord,
            &[("EarNum", "EarNum"), ("YeanDate", "YeanDate")],
            &["EarNum", "YeanDate"],
            vec![cell("G001"), cell("unknown")],
        );
        assert!(matches!(result, Err(RowError::Parse { .. })));
    }

    #[test]
    fn test_yean_emits_independent_events() {
        let columns = [
            ("EarNum", "EarNum"),
            ("YeanDate", "YeanDate"),
            ("DryOffDate", "DryOffDate"),
            ("Lactation", "Lactation"),
        ];
        let headers = ["EarNum", "YeanDate", "DryOffDate", "Lactation"];

        let both = run(
            SheetPurpose::YeanRecord,
            &columns,
            &headers,
            vec![cell("G001"), cell("2024-01-10"), cell("2024-08-01"), cell("2")],
        )
        .unwrap();
        assert_eq!(both.len(), 2);

        let dry_only = run(
            SheetPurpose::YeanRecord,
            &columns,
            &headers,
            vec![cell("G001"), None, cell("2024-08-01"), cell("2")],
        )
        .unwrap();
        match &dry_only[..] {
            [DerivedRecord::Event(e)] => {
                assert_eq!(e.event_type, "dry-off");
                assert_eq!(e.description.as_deref(), Some("Lactation 2 ended"));
            }
            other => panic!("unexpected records: {:?}", other),
        }

        let neither = run(
            SheetPurpose::YeanRecord,
            &columns,
            &headers,
            vec![cell("G001"), cell("bad"), None, None],
        )
        .unwrap();
        assert!(neither.is_empty());
    }

    #[test]
    fn test_milk_requires_finite_value() {
        let columns = [("EarNum", "EarNum"), ("MeaDate", "MeaDate"), ("Milk", "Milk")];
        let headers = ["EarNum", "MeaDate", "Milk"];

        let ok = run(
            SheetPurpose::MilkYieldRecord,
            &columns,
            &headers,
            vec![cell("G001"), cell("2024-02-01"), cell("2.5")],
        )
        .unwrap();
        match &ok[0] {
            DerivedRecord::History(p) => {
                assert_eq!(p.metric, "milk_yield");
                assert_eq!(p.value, 2.5);
            }
            other => panic!("unexpected record: {:?}", other),
        }

        for bad in [cell("abc"), cell("NaN"), None] {
            let result = run(
                SheetPurpose::MilkYieldRecord,
                &columns,
                &headers,
                vec![cell("G001"), cell("2024-02-01"), bad],
            );
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_history_log_keeps_metric_and_notes() {
        let records = run(
            SheetPurpose::HistoryLog,
            &[
                ("EarNum", "EarNum"),
                ("record_date", "record_date"),
                ("record_type", "record_type"),
                ("value", "value"),
                ("notes", "notes"),
            ],
            &["EarNum", "record_date", "record_type", "value", "notes"],
            vec![
                cell("G001"),
                cell("2024-03-01 00:00:00"),
                cell("body_weight"),
                cell("41.5"),
                cell("after shearing"),
            ],
        )
        .unwrap();
        match &records[0] {
            DerivedRecord::History(p) => {
                assert_eq!(p.record_date, "2024-03-01");
                assert_eq!(p.metric, "body_weight");
                assert_eq!(p.notes.as_deref(), Some("after shearing"));
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_non_derived_purposes_have_no_handler() {
        assert!(handler_for(SheetPurpose::Unknown).is_none());
        assert!(handler_for(SheetPurpose::BasicInfo).is_none());
        assert!(handler_for(SheetPurpose::Ignore).is_none());
    }
}
