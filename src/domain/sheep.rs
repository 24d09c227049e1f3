// ==========================================
// 羊群档案系统 - 羊只领域模型
// ==========================================
// 职责: 羊只主档（规范实体）及其字段目录
// 约束: (owner_id, ear_num) 唯一
// ==========================================

use crate::domain::types::{FieldKind, FieldValue, Metric};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// SheepField - 羊只字段目录
// ==========================================
// 字段名即导入映射中的逻辑字段名，也是数据库列名与导出列名
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SheepField {
    // ===== 核心识别 =====
    EarNum,
    BirthDate,
    Sex,
    Breed,

    // ===== 血统 =====
    Sire,
    Dam,

    // ===== 基础表扩充字段 =====
    BirWei,
    SireBre,
    DamBre,
    MoveCau,
    MoveDate,
    Class,
    LittleSize,
    Lactation,
    ManaClas,
    FarmNum,
    RUni,

    // ===== 饲养管理与生产性能 =====
    BodyWeightKg,
    AgeMonths,
    BreedCategory,
    Status,
    StatusDescription,
    TargetAverageDailyGainG,
    MilkYieldKgDay,
    MilkFatPercentage,
    NumberOfFetuses,
    ExpectedFiberYieldGDay,
    ActivityLevel,

    // ===== 备注与提醒 =====
    OtherRemarks,
    AgentNotes,
    NextVaccinationDueDate,
    NextDewormingDueDate,
    ExpectedLambingDate,
}

impl SheepField {
    /// 全部字段（按导出列顺序）
    pub const ALL: [SheepField; 33] = [
        SheepField::EarNum,
        SheepField::BirthDate,
        SheepField::Sex,
        SheepField::Breed,
        SheepField::Sire,
        SheepField::Dam,
        SheepField::BirWei,
        SheepField::SireBre,
        SheepField::DamBre,
        SheepField::MoveCau,
        SheepField::MoveDate,
        SheepField::Class,
        SheepField::LittleSize,
        SheepField::Lactation,
        SheepField::ManaClas,
        SheepField::FarmNum,
        SheepField::RUni,
        SheepField::BodyWeightKg,
        SheepField::AgeMonths,
        SheepField::BreedCategory,
        SheepField::Status,
        SheepField::StatusDescription,
        SheepField::TargetAverageDailyGainG,
        SheepField::MilkYieldKgDay,
        SheepField::MilkFatPercentage,
        SheepField::NumberOfFetuses,
        SheepField::ExpectedFiberYieldGDay,
        SheepField::ActivityLevel,
        SheepField::OtherRemarks,
        SheepField::AgentNotes,
        SheepField::NextVaccinationDueDate,
        SheepField::NextDewormingDueDate,
        SheepField::ExpectedLambingDate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SheepField::EarNum => "EarNum",
            SheepField::BirthDate => "BirthDate",
            SheepField::Sex => "Sex",
            SheepField::Breed => "Breed",
            SheepField::Sire => "Sire",
            SheepField::Dam => "Dam",
            SheepField::BirWei => "BirWei",
            SheepField::SireBre => "SireBre",
            SheepField::DamBre => "DamBre",
            SheepField::MoveCau => "MoveCau",
            SheepField::MoveDate => "MoveDate",
            SheepField::Class => "Class",
            SheepField::LittleSize => "LittleSize",
            SheepField::Lactation => "Lactation",
            SheepField::ManaClas => "ManaClas",
            SheepField::FarmNum => "FarmNum",
            SheepField::RUni => "RUni",
            SheepField::BodyWeightKg => "Body_Weight_kg",
            SheepField::AgeMonths => "Age_Months",
            SheepField::BreedCategory => "breed_category",
            SheepField::Status => "status",
            SheepField::StatusDescription => "status_description",
            SheepField::TargetAverageDailyGainG => "target_average_daily_gain_g",
            SheepField::MilkYieldKgDay => "milk_yield_kg_day",
            SheepField::MilkFatPercentage => "milk_fat_percentage",
            SheepField::NumberOfFetuses => "number_of_fetuses",
            SheepField::ExpectedFiberYieldGDay => "expected_fiber_yield_g_day",
            SheepField::ActivityLevel => "activity_level",
            SheepField::OtherRemarks => "other_remarks",
            SheepField::AgentNotes => "agent_notes",
            SheepField::NextVaccinationDueDate => "next_vaccination_due_date",
            SheepField::NextDewormingDueDate => "next_deworming_due_date",
            SheepField::ExpectedLambingDate => "expected_lambing_date",
        }
    }

    /// 按字段名查找（精确匹配）
    pub fn from_name(name: &str) -> Option<SheepField> {
        SheepField::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            SheepField::BirWei
            | SheepField::BodyWeightKg
            | SheepField::TargetAverageDailyGainG
            | SheepField::MilkYieldKgDay
            | SheepField::MilkFatPercentage
            | SheepField::ExpectedFiberYieldGDay => FieldKind::Float,
            SheepField::LittleSize
            | SheepField::Lactation
            | SheepField::AgeMonths
            | SheepField::NumberOfFetuses => FieldKind::Integer,
            _ if self.is_date() => FieldKind::Date,
            _ => FieldKind::Text,
        }
    }

    /// 字段名含 "date"（不区分大小写）即为日期字段
    pub fn is_date(&self) -> bool {
        self.name().to_ascii_lowercase().contains("date")
    }

    /// 直接更新时需要记录历史的数值字段
    pub fn tracked_metric(&self) -> Option<Metric> {
        match self {
            SheepField::BodyWeightKg => Some(Metric::BodyWeight),
            SheepField::MilkYieldKgDay => Some(Metric::MilkYield),
            SheepField::MilkFatPercentage => Some(Metric::MilkFat),
            _ => None,
        }
    }

    /// 属性字段（除耳号外的全部字段）
    pub fn attributes() -> impl Iterator<Item = SheepField> {
        SheepField::ALL
            .into_iter()
            .filter(|f| *f != SheepField::EarNum)
    }
}

impl fmt::Display for SheepField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for SheepField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ==========================================
// Sheep - 羊只主档
// ==========================================
// 用途: 导入层与直接维护接口写入，导出层只读
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheep {
    pub id: i64,
    pub owner_id: i64,
    #[serde(rename = "EarNum")]
    pub ear_num: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<SheepField, FieldValue>,
    pub last_updated: DateTime<Utc>,
}

impl Sheep {
    /// 新建尚未落库的羊只（id = 0）
    pub fn new(owner_id: i64, ear_num: &str) -> Self {
        Self {
            id: 0,
            owner_id,
            ear_num: ear_num.to_string(),
            attributes: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn get(&self, field: SheepField) -> Option<&FieldValue> {
        self.attributes.get(&field)
    }

    /// 写入属性；耳号不经由此方法修改
    pub fn set(&mut self, field: SheepField, value: FieldValue) {
        if field == SheepField::EarNum {
            return;
        }
        self.attributes.insert(field, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip() {
        for field in SheepField::ALL {
            assert_eq!(SheepField::from_name(field.name()), Some(field));
        }
        assert_eq!(SheepField::from_name("Unknown"), None);
    }

    #[test]
    fn test_date_fields_case_insensitive() {
        assert_eq!(SheepField::BirthDate.kind(), FieldKind::Date);
        assert_eq!(SheepField::NextVaccinationDueDate.kind(), FieldKind::Date);
        assert_eq!(SheepField::Breed.kind(), FieldKind::Text);
        assert_eq!(SheepField::BirWei.kind(), FieldKind::Float);
        assert_eq!(SheepField::LittleSize.kind(), FieldKind::Integer);
    }

    #[test]
    fn test_set_ignores_ear_num() {
        let mut sheep = Sheep::new(1, "G001");
        sheep.set(SheepField::EarNum, FieldValue::Text("G999".to_string()));
        assert_eq!(sheep.ear_num, "G001");
        assert!(sheep.get(SheepField::EarNum).is_none());
    }

    #[test]
    fn test_serialize_flattens_attributes() {
        let mut sheep = Sheep::new(1, "G001");
        sheep.set(SheepField::Breed, FieldValue::Text("Boer".to_string()));
        let json = serde_json::to_value(&sheep).unwrap();
        assert_eq!(json["EarNum"], "G001");
        assert_eq!(json["Breed"], "Boer");
    }
}
