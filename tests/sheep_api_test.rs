// ==========================================
// 羊只维护 API 集成测试
// ==========================================
// 测试目标: 验证直接维护接口的唯一性、变更历史与 owner 隔离
// 覆盖范围:
// - 新建 / 冲突 / 必填校验
// - 跟踪字段变化时追加历史数据点
// - 删除羊只级联删除事件与历史
// - 事件 / 历史 / 对话记录的 owner 隔离
// - 事件下拉选项: 默认项写入 / 自定义增删 / 默认项保护
// ==========================================

mod test_helpers;

use flock_ledger::api::{ApiError, EventInput, SheepInput, SheepUpdate};
use flock_ledger::logging;
use flock_ledger::domain::DEFAULT_EVENT_OPTIONS;
use flock_ledger::{FieldValue, SheepField};
use std::collections::BTreeMap;
use test_helpers::*;

const OWNER: i64 = 1;
const OTHER_OWNER: i64 = 2;

fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn sheep_input(ear_num: &str, pairs: &[(&str, &str)]) -> SheepInput {
    SheepInput {
        ear_num: ear_num.to_string(),
        fields: fields(pairs),
    }
}

fn event_input(date: &str, event_type: &str) -> EventInput {
    EventInput {
        event_date: date.to_string(),
        event_type: event_type.to_string(),
        ..Default::default()
    }
}

// ==========================================
// 新建
// ==========================================

#[test]
fn test_create_sheep_and_conflict() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();

    let sheep = state
        .sheep_api
        .create_sheep(
            OWNER,
            &sheep_input("G001", &[("Breed", "Saanen"), ("BirthDate", "2022/1/9")]),
        )
        .unwrap();
    assert!(sheep.id > 0);
    assert_eq!(sheep.ear_num, "G001");
    assert_eq!(
        sheep.get(SheepField::BirthDate),
        Some(&FieldValue::Text("2022-01-09".to_string()))
    );

    let err = state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[]))
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let err = state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("   ", &[]))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G002", &[("Body_Weight_kg", "heavy")]))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    assert_eq!(state.sheep_api.list_sheep(OWNER).unwrap().len(), 1);
}

#[test]
fn test_sheep_input_deserializes_from_flat_json() {
    let input: SheepInput =
        serde_json::from_str(r#"{"EarNum": "G010", "Breed": "Boer", "Lactation": "2"}"#).unwrap();
    assert_eq!(input.ear_num, "G010");
    assert_eq!(input.fields, fields(&[("Breed", "Boer"), ("Lactation", "2")]));
}

#[test]
fn test_sheep_json_accepts_numeric_values() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();

    let input: SheepInput = serde_json::from_str(
        r#"{"EarNum": 1001, "Body_Weight_kg": 42.5, "Lactation": 2, "Breed": null}"#,
    )
    .unwrap();
    assert_eq!(input.ear_num, "1001");
    assert_eq!(
        input.fields,
        fields(&[("Body_Weight_kg", "42.5"), ("Lactation", "2")])
    );

    let sheep = state.sheep_api.create_sheep(OWNER, &input).unwrap();
    assert_eq!(sheep.get(SheepField::BodyWeightKg), Some(&FieldValue::Float(42.5)));
    assert_eq!(sheep.get(SheepField::Lactation), Some(&FieldValue::Integer(2)));
    assert_eq!(sheep.get(SheepField::Breed), None);

    let update: SheepUpdate =
        serde_json::from_str(r#"{"record_date": "2024-06-01", "Body_Weight_kg": 44}"#).unwrap();
    assert_eq!(update.record_date.as_deref(), Some("2024-06-01"));
    state.sheep_api.update_sheep(OWNER, "1001", &update).unwrap();
    let history = state.sheep_api.list_history(OWNER, "1001").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].value, 44.0);

    assert!(serde_json::from_str::<SheepInput>(r#"{"Breed": "Boer"}"#).is_err());
    assert!(serde_json::from_str::<SheepInput>(r#"{"EarNum": "G1", "Breed": ["a"]}"#).is_err());
}

// ==========================================
// 更新与变更历史
// ==========================================

#[test]
fn test_update_tracks_numeric_changes() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();
    state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[("Body_Weight_kg", "40"), ("Breed", "Boer")]))
        .unwrap();

    let update = SheepUpdate {
        record_date: Some("2024/06/01".to_string()),
        fields: fields(&[
            ("Body_Weight_kg", "42.5"),
            ("milk_yield_kg_day", "1.5"),
            ("Breed", ""),
        ]),
    };
    let sheep = state.sheep_api.update_sheep(OWNER, "G001", &update).unwrap();
    assert_eq!(sheep.get(SheepField::BodyWeightKg), Some(&FieldValue::Float(42.5)));
    // 空值不覆盖已有值
    assert_eq!(
        sheep.get(SheepField::Breed),
        Some(&FieldValue::Text("Boer".to_string()))
    );

    let history = state.sheep_api.list_history(OWNER, "G001").unwrap();
    assert_eq!(history.len(), 2);
    let weight = history.iter().find(|h| h.metric == "body_weight").unwrap();
    assert_eq!(weight.record_date, "2024-06-01");
    assert_eq!(weight.value, 42.5);
    assert_eq!(weight.notes.as_deref(), Some("updated from 40 to 42.5"));
    let milk = history.iter().find(|h| h.metric == "milk_yield").unwrap();
    assert_eq!(milk.notes.as_deref(), Some("set to 1.5"));

    // 数值未变化不追加
    let same = SheepUpdate {
        record_date: Some("2024-06-02".to_string()),
        fields: fields(&[("Body_Weight_kg", "42.50")]),
    };
    state.sheep_api.update_sheep(OWNER, "G001", &same).unwrap();
    assert_eq!(state.sheep_api.list_history(OWNER, "G001").unwrap().len(), 2);

    // 非跟踪字段不产生历史
    let untracked = SheepUpdate {
        record_date: None,
        fields: fields(&[("status", "pregnant")]),
    };
    state.sheep_api.update_sheep(OWNER, "G001", &untracked).unwrap();
    assert_eq!(state.sheep_api.list_history(OWNER, "G001").unwrap().len(), 2);
}

#[test]
fn test_update_skips_history_when_old_value_not_numeric() {
    logging::init_test();
    let (_tmp, db_path, state) = create_test_state();
    state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[]))
        .unwrap();

    // 历史遗留的非数值内容
    open_conn(&db_path)
        .execute(
            "UPDATE sheep SET \"Body_Weight_kg\" = 'heavy' WHERE \"EarNum\" = 'G001'",
            [],
        )
        .unwrap();

    let update = SheepUpdate {
        record_date: Some("2024-06-01".to_string()),
        fields: fields(&[("Body_Weight_kg", "45")]),
    };
    let sheep = state.sheep_api.update_sheep(OWNER, "G001", &update).unwrap();
    assert_eq!(sheep.get(SheepField::BodyWeightKg), Some(&FieldValue::Float(45.0)));
    assert!(state.sheep_api.list_history(OWNER, "G001").unwrap().is_empty());
}

#[test]
fn test_update_rejects_bad_input() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();
    state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[]))
        .unwrap();

    let rename = SheepUpdate {
        record_date: None,
        fields: fields(&[("EarNum", "G002")]),
    };
    assert!(matches!(
        state.sheep_api.update_sheep(OWNER, "G001", &rename),
        Err(ApiError::InvalidInput(_))
    ));

    let bad_date = SheepUpdate {
        record_date: Some("someday".to_string()),
        fields: fields(&[("Body_Weight_kg", "40")]),
    };
    assert!(matches!(
        state.sheep_api.update_sheep(OWNER, "G001", &bad_date),
        Err(ApiError::InvalidInput(_))
    ));

    assert!(matches!(
        state
            .sheep_api
            .update_sheep(OTHER_OWNER, "G001", &SheepUpdate::default()),
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 删除与级联
// ==========================================

#[test]
fn test_delete_sheep_cascades() {
    logging::init_test();
    let (_tmp, db_path, state) = create_test_state();
    state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[("Body_Weight_kg", "40")]))
        .unwrap();
    state
        .sheep_api
        .add_event(OWNER, "G001", &event_input("2024-02-01", "vaccination"))
        .unwrap();
    state
        .sheep_api
        .update_sheep(
            OWNER,
            "G001",
            &SheepUpdate {
                record_date: Some("2024-02-01".to_string()),
                fields: fields(&[("Body_Weight_kg", "41")]),
            },
        )
        .unwrap();
    assert_eq!(count_rows(&db_path, "sheep_event", OWNER), 1);
    assert_eq!(count_rows(&db_path, "sheep_historical_data", OWNER), 1);

    // 其他 owner 不可删除
    assert!(matches!(
        state.sheep_api.delete_sheep(OTHER_OWNER, "G001"),
        Err(ApiError::NotFound(_))
    ));

    state.sheep_api.delete_sheep(OWNER, "G001").unwrap();
    assert_eq!(count_rows(&db_path, "sheep", OWNER), 0);
    assert_eq!(count_rows(&db_path, "sheep_event", OWNER), 0);
    assert_eq!(count_rows(&db_path, "sheep_historical_data", OWNER), 0);

    assert!(matches!(
        state.sheep_api.delete_sheep(OWNER, "G001"),
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 事件 / 历史
// ==========================================

#[test]
fn test_event_lifecycle_and_owner_scope() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();
    state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[]))
        .unwrap();

    let first = state
        .sheep_api
        .add_event(OWNER, "G001", &event_input("2024/1/5", "deworming"))
        .unwrap();
    assert_eq!(first.event_date, "2024-01-05");
    let second = state
        .sheep_api
        .add_event(
            OWNER,
            "G001",
            &EventInput {
                event_date: "2024-03-01".to_string(),
                event_type: "hoof trimming".to_string(),
                description: Some("  ".to_string()),
                notes: Some("left front".to_string()),
            },
        )
        .unwrap();
    assert_eq!(second.description, None);

    // 日期倒序
    let events = state.sheep_api.list_events(OWNER, "G001").unwrap();
    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    assert!(matches!(
        state
            .sheep_api
            .add_event(OWNER, "G001", &event_input("", "deworming")),
        Err(ApiError::InvalidInput(_))
    ));

    let edited = state
        .sheep_api
        .update_event(OWNER, first.id, &event_input("2024-01-06", "deworming"))
        .unwrap();
    assert_eq!(edited.event_date, "2024-01-06");

    assert!(matches!(
        state
            .sheep_api
            .update_event(OTHER_OWNER, first.id, &event_input("2024-01-07", "x")),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        state.sheep_api.delete_event(OTHER_OWNER, first.id),
        Err(ApiError::NotFound(_))
    ));

    state.sheep_api.delete_event(OWNER, first.id).unwrap();
    let detail = state.sheep_api.get_sheep_detail(OWNER, "G001").unwrap();
    assert_eq!(detail.events.len(), 1);
    assert_eq!(detail.events[0].id, second.id);
}

#[test]
fn test_detail_limits_recent_events() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();
    state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[]))
        .unwrap();
    for day in 1..=12 {
        let date = format!("2024-01-{:02}", day);
        state
            .sheep_api
            .add_event(OWNER, "G001", &event_input(&date, "check"))
            .unwrap();
    }

    let detail = state.sheep_api.get_sheep_detail(OWNER, "G001").unwrap();
    assert_eq!(detail.events.len(), 10);
    assert_eq!(detail.events[0].event_date, "2024-01-12");
    assert_eq!(state.sheep_api.list_events(OWNER, "G001").unwrap().len(), 12);
}

#[test]
fn test_delete_history_point() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();
    state
        .sheep_api
        .create_sheep(OWNER, &sheep_input("G001", &[]))
        .unwrap();
    state
        .sheep_api
        .update_sheep(
            OWNER,
            "G001",
            &SheepUpdate {
                record_date: Some("2024-04-01".to_string()),
                fields: fields(&[("milk_fat_percentage", "6.2")]),
            },
        )
        .unwrap();

    let history = state.sheep_api.list_history(OWNER, "G001").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].metric, "milk_fat");

    assert!(matches!(
        state.sheep_api.delete_history(OTHER_OWNER, history[0].id),
        Err(ApiError::NotFound(_))
    ));
    state.sheep_api.delete_history(OWNER, history[0].id).unwrap();
    assert!(state.sheep_api.list_history(OWNER, "G001").unwrap().is_empty());
}

// ==========================================
// 对话记录
// ==========================================

#[test]
fn test_chat_exchange_is_saved_per_owner() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();

    state
        .sheep_api
        .save_chat_exchange(OWNER, "s-1", Some("G001"), "How is G001?", "Healthy.")
        .unwrap();
    assert!(matches!(
        state.sheep_api.save_chat_exchange(OWNER, " ", None, "q", "a"),
        Err(ApiError::InvalidInput(_))
    ));

    let messages = state.sheep_api.list_chat_history(OWNER).unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].content, "How is G001?");
    assert_eq!(messages[1].role, "model");
    assert_eq!(messages[1].ear_num_context.as_deref(), Some("G001"));

    assert!(state.sheep_api.list_chat_history(OTHER_OWNER).unwrap().is_empty());
}

// ==========================================
// 事件下拉选项
// ==========================================

#[test]
fn test_event_options_seeded_per_owner() {
    logging::init_test();
    let (_tmp, db_path, state) = create_test_state();
    let api = &state.event_option_api;

    let options = api.list_event_options(OWNER).unwrap();
    assert_eq!(options.len(), DEFAULT_EVENT_OPTIONS.len());
    assert!(options.iter().all(|t| t.is_default && t.owner_id == OWNER));
    let mating = options.iter().find(|t| t.name == "配种").unwrap();
    let descriptions: Vec<_> = mating.descriptions.iter().map(|d| d.description.as_str()).collect();
    assert_eq!(descriptions, vec!["人工授精", "自然配种"]);

    // 重复访问不重复写入
    api.list_event_options(OWNER).unwrap();
    assert_eq!(
        count_rows(&db_path, "event_type_option", OWNER),
        DEFAULT_EVENT_OPTIONS.len() as i64
    );
    assert_eq!(count_rows(&db_path, "event_type_option", OTHER_OWNER), 0);
}

#[test]
fn test_custom_event_type_lifecycle() {
    logging::init_test();
    let (_tmp, db_path, state) = create_test_state();
    let api = &state.event_option_api;

    let shearing = api.add_event_type(OWNER, " 剪毛 ").unwrap();
    assert_eq!(shearing.name, "剪毛");
    assert!(!shearing.is_default);
    assert!(matches!(
        api.add_event_type(OWNER, "剪毛"),
        Err(ApiError::Conflict(_))
    ));
    assert!(matches!(
        api.add_event_type(OWNER, "驱虫"),
        Err(ApiError::Conflict(_))
    ));
    assert!(matches!(
        api.add_event_type(OWNER, "  "),
        Err(ApiError::InvalidInput(_))
    ));

    // 自定义项排在默认项之后
    let options = api.list_event_options(OWNER).unwrap();
    assert_eq!(options.last().map(|t| t.name.as_str()), Some("剪毛"));

    let spring = api.add_event_description(OWNER, shearing.id, "春季剪毛").unwrap();
    assert_eq!(spring.event_type_option_id, shearing.id);
    assert!(matches!(
        api.add_event_description(OWNER, shearing.id, "春季剪毛"),
        Err(ApiError::Conflict(_))
    ));
    assert!(matches!(
        api.add_event_description(OTHER_OWNER, shearing.id, "秋季剪毛"),
        Err(ApiError::NotFound(_))
    ));

    // 跨 owner 不可删除；删除类型级联删除描述
    assert!(matches!(
        api.delete_event_type(OTHER_OWNER, shearing.id),
        Err(ApiError::NotFound(_))
    ));
    api.delete_event_type(OWNER, shearing.id).unwrap();
    assert!(!api
        .list_event_options(OWNER)
        .unwrap()
        .iter()
        .any(|t| t.name == "剪毛"));
    let leftover: i64 = open_conn(&db_path)
        .query_row(
            "SELECT COUNT(*) FROM event_description_option WHERE event_type_option_id = ?1",
            [shearing.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(leftover, 0);
}

#[test]
fn test_default_event_options_cannot_be_deleted() {
    logging::init_test();
    let (_tmp, _db_path, state) = create_test_state();
    let api = &state.event_option_api;

    let options = api.list_event_options(OWNER).unwrap();
    let vaccination = options.iter().find(|t| t.name == "疫苗接种").unwrap();
    assert!(matches!(
        api.delete_event_type(OWNER, vaccination.id),
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        api.delete_event_description(OWNER, vaccination.descriptions[0].id),
        Err(ApiError::InvalidInput(_))
    ));

    // 默认类型下的自定义描述可以删除
    let custom = api
        .add_event_description(OWNER, vaccination.id, "羊痘疫苗")
        .unwrap();
    api.delete_event_description(OWNER, custom.id).unwrap();
    assert!(matches!(
        api.delete_event_description(OWNER, custom.id),
        Err(ApiError::NotFound(_))
    ));

    let after = api.list_event_options(OWNER).unwrap();
    let vaccination = after.iter().find(|t| t.name == "疫苗接种").unwrap();
    assert_eq!(vaccination.descriptions.len(), 3);
}
