// ==========================================
// 羊群档案系统 - 导入映射配置
// ==========================================
// 职责: 工作表 → 用途 → 列映射 的声明式配置
// 格式: {"sheets": {"<表名>": {"purpose": "<用途>", "columns": {"<逻辑字段>": "<源列名>"}}}}
// 约束: 表的声明顺序即处理顺序；未知用途不报错，按空操作处理
// ==========================================

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// 默认映射配置版本（源系统标准导出格式变化时同步更新）
pub const DEFAULT_MAPPING_VERSION: &str = "2024.1";

/// 耳号逻辑字段名（所有业务表共用）
pub const EAR_NUM_COLUMN: &str = "EarNum";

/// 对照表逻辑字段名
pub const LOOKUP_CODE_COLUMN: &str = "Code";
pub const LOOKUP_NAME_COLUMN: &str = "Name";

// ==========================================
// SheetPurpose - 工作表用途（封闭枚举）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetPurpose {
    Ignore,             // 忽略
    BasicInfo,          // 基础资料
    BreedMapping,       // 品种对照表
    SexMapping,         // 性别对照表
    KiddingRecord,      // 产仔记录
    MatingRecord,       // 配种记录
    YeanRecord,         // 泌乳/干乳记录
    WeightRecord,       // 体重记录
    MilkYieldRecord,    // 产奶量记录
    MilkAnalysisRecord, // 乳成分记录
    EventLog,           // 通用事件日志（导出格式）
    HistoryLog,         // 通用历史数据（导出格式）
    #[serde(other)]
    Unknown, // 无法识别的用途：空操作
}

/// 对照表种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Breed,
    Sex,
}

impl SheetPurpose {
    /// 对照表用途 → 对照表种类
    pub fn lookup_kind(&self) -> Option<LookupKind> {
        match self {
            SheetPurpose::BreedMapping => Some(LookupKind::Breed),
            SheetPurpose::SexMapping => Some(LookupKind::Sex),
            _ => None,
        }
    }

    /// 是否属于派生记录阶段处理的用途
    pub fn is_derived(&self) -> bool {
        !matches!(
            self,
            SheetPurpose::Ignore
                | SheetPurpose::BasicInfo
                | SheetPurpose::BreedMapping
                | SheetPurpose::SexMapping
        )
    }
}

// ==========================================
// SheetSpec - 单个工作表的映射声明
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSpec {
    pub sheet_name: String,
    pub purpose: SheetPurpose,
    pub column_map: BTreeMap<String, String>, // 逻辑字段 → 源列名
}

impl SheetSpec {
    pub fn new(sheet_name: &str, purpose: SheetPurpose, columns: &[(&str, &str)]) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            purpose,
            column_map: columns
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// 逻辑字段对应的源列名
    pub fn column(&self, logical: &str) -> Option<&str> {
        self.column_map.get(logical).map(String::as_str)
    }
}

/// JSON 中单个表的原始形态
#[derive(Deserialize)]
struct RawSheetSpec {
    #[serde(default)]
    purpose: Option<SheetPurpose>,
    #[serde(default)]
    columns: BTreeMap<String, Option<String>>,
}

#[derive(Serialize)]
struct RawSheetSpecRef<'a> {
    purpose: SheetPurpose,
    columns: &'a BTreeMap<String, String>,
}

// ==========================================
// MappingConfig - 映射配置（有序）
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MappingConfig {
    pub sheets: Vec<SheetSpec>,
}

impl MappingConfig {
    /// 从 JSON 文本解析
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 第一个基础资料表（多个时只认第一个）
    pub fn basic_info_sheet(&self) -> Option<&SheetSpec> {
        self.sheets
            .iter()
            .find(|s| s.purpose == SheetPurpose::BasicInfo)
    }

    pub fn lookup_sheets(&self) -> impl Iterator<Item = (&SheetSpec, LookupKind)> {
        self.sheets
            .iter()
            .filter_map(|s| s.purpose.lookup_kind().map(|kind| (s, kind)))
    }

    pub fn derived_sheets(&self) -> impl Iterator<Item = &SheetSpec> {
        self.sheets.iter().filter(|s| s.purpose.is_derived())
    }

    fn upsert_sheet(&mut self, spec: SheetSpec) {
        // 同名表后出现者覆盖先出现者，但保留首次出现的位置
        match self
            .sheets
            .iter_mut()
            .find(|s| s.sheet_name == spec.sheet_name)
        {
            Some(existing) => *existing = spec,
            None => self.sheets.push(spec),
        }
    }
}

struct OrderedSheetsVisitor;

impl<'de> Visitor<'de> for OrderedSheetsVisitor {
    type Value = MappingConfig;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("工作表名 → 映射声明 的对象")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut config = MappingConfig::default();
        while let Some((sheet_name, raw)) = map.next_entry::<String, RawSheetSpec>()? {
            config.upsert_sheet(SheetSpec {
                sheet_name,
                purpose: raw.purpose.unwrap_or(SheetPurpose::Unknown),
                column_map: raw
                    .columns
                    .into_iter()
                    .filter_map(|(k, v)| v.map(|v| (k, v)))
                    .collect(),
            });
        }
        Ok(config)
    }
}

struct OrderedSheets(MappingConfig);

impl<'de> Deserialize<'de> for OrderedSheets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_map(OrderedSheetsVisitor)
            .map(OrderedSheets)
    }
}

impl<'de> Deserialize<'de> for MappingConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default)]
            sheets: Option<OrderedSheets>,
        }

        let wrapper = Wrapper::deserialize(deserializer)?;
        Ok(wrapper.sheets.map(|s| s.0).unwrap_or_default())
    }
}

struct SheetsRef<'a>(&'a [SheetSpec]);

impl Serialize for SheetsRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for spec in self.0 {
            map.serialize_entry(
                &spec.sheet_name,
                &RawSheetSpecRef {
                    purpose: spec.purpose,
                    columns: &spec.column_map,
                },
            )?;
        }
        map.end()
    }
}

impl Serialize for MappingConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("sheets", &SheetsRef(&self.sheets))?;
        map.end()
    }
}

/// 带版本号的序列化形态（仅用于输出默认配置）
#[derive(Serialize)]
struct VersionedRef<'a> {
    version: &'a str,
    sheets: SheetsRef<'a>,
}

// ==========================================
// 默认映射配置（标准源导出格式）
// ==========================================
type SheetDecl = (&'static str, SheetPurpose, &'static [(&'static str, &'static str)]);

const DEFAULT_SHEETS: &[SheetDecl] = &[
    (
        "0009-0013A1_Basic",
        SheetPurpose::BasicInfo,
        &[
            ("EarNum", "EarNum"),
            ("Breed", "Breed"),
            ("Sex", "Sex"),
            ("BirthDate", "BirthDate"),
            ("Sire", "Sire"),
            ("Dam", "Dam"),
            ("BirWei", "BirWei"),
            ("SireBre", "SireBre"),
            ("DamBre", "DamBre"),
            ("MoveCau", "MoveCau"),
            ("MoveDate", "MoveDate"),
            ("Class", "Class"),
            ("LittleSize", "LittleSize"),
            ("Lactation", "Lactation"),
            ("ManaClas", "ManaClas"),
            ("FarmNum", "FarmNum"),
            ("RUni", "RUni"),
        ],
    ),
    (
        "0009-0013A4_Kidding",
        SheetPurpose::KiddingRecord,
        &[
            ("EarNum", "EarNum"),
            ("YeanDate", "YeanDate"),
            ("KidNum", "KidNum"),
            ("KidSex", "KidSex"),
        ],
    ),
    (
        "0009-0013A2_PubMat",
        SheetPurpose::MatingRecord,
        &[
            ("EarNum", "EarNum"),
            ("Mat_date", "Mat_date"),
            ("Mat_grouM_Sire", "Mat_grouM_Sire"),
        ],
    ),
    (
        "0009-0013A3_Yean",
        SheetPurpose::YeanRecord,
        &[
            ("EarNum", "EarNum"),
            ("YeanDate", "YeanDate"),
            ("DryOffDate", "DryOffDate"),
            ("Lactation", "Lactation"),
        ],
    ),
    (
        "0009-0013A9_Milk",
        SheetPurpose::MilkYieldRecord,
        &[("EarNum", "EarNum"), ("MeaDate", "MeaDate"), ("Milk", "Milk")],
    ),
    (
        "0009-0013A11_MilkAnalysis",
        SheetPurpose::MilkAnalysisRecord,
        &[("EarNum", "EarNum"), ("MeaDate", "MeaDate"), ("AMFat", "AMFat")],
    ),
    (
        "S2_Breed",
        SheetPurpose::BreedMapping,
        &[("Code", "Symbol"), ("Name", "Breed")],
    ),
    (
        "S7_Sex",
        SheetPurpose::SexMapping,
        &[("Code", "Num"), ("Name", "Sex")],
    ),
];

/// 默认映射配置
pub fn default_mapping_config() -> MappingConfig {
    MappingConfig {
        sheets: DEFAULT_SHEETS
            .iter()
            .map(|(name, purpose, columns)| SheetSpec::new(name, *purpose, columns))
            .collect(),
    }
}

/// 默认映射配置的 JSON 文本，附带版本号
///
/// version 键在解析时被忽略，输出可直接作为自定义配置回传
pub fn default_mapping_json() -> Result<String, serde_json::Error> {
    let config = default_mapping_config();
    serde_json::to_string_pretty(&VersionedRef {
        version: DEFAULT_MAPPING_VERSION,
        sheets: SheetsRef(&config.sheets),
    })
}
