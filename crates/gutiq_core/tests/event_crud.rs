use chrono::{DateTime, Duration, TimeZone, Utc};
use gutiq_core::db::migrations::latest_version;
use gutiq_core::db::open_db_in_memory;
use gutiq_core::{
    EventError, EventKind, EventPayload, EventRepository, EventService, MealData, NewEvent,
    RepoError, Severity, SqliteEventRepository,
};
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use uuid::Uuid;

fn t(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
}

fn new_event(timestamp: DateTime<Utc>, event_type: &str, data: Value) -> NewEvent {
    NewEvent {
        timestamp,
        event_type: event_type.to_string(),
        data,
    }
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn example_scenario_create_list_and_fetch() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let mut service = EventService::new(repo);

    let meal_id = service
        .create_event(&new_event(
            t(8),
            "meal",
            json!({"foods": ["rice", "beans"], "calories": 500}),
        ))
        .unwrap();
    let exercise_id = service
        .create_event(&new_event(
            t(9),
            "exercise",
            json!({"type": "running", "duration_minutes": 30}),
        ))
        .unwrap();

    let listed: Vec<_> = service
        .list_events()
        .unwrap()
        .into_iter()
        .map(|event| event.event_id)
        .collect();
    assert_eq!(listed, vec![exercise_id, meal_id]);

    let meal = service.get_event(meal_id).unwrap();
    let json = serde_json::to_value(&meal).unwrap();
    assert_eq!(
        json,
        json!({
            "event_id": meal_id.to_string(),
            "timestamp": "2024-05-01T08:00:00Z",
            "event_type": "meal",
            "data": {
                "foods": ["rice", "beans"],
                "calories": 500.0,
                "protein": null,
                "carbohydrates": null,
                "fats": null
            }
        })
    );

    let missing = Uuid::new_v4();
    let err = service.get_event(missing).unwrap_err();
    assert!(matches!(err, EventError::NotFound(id) if id == missing));
}

#[test]
fn create_and_get_roundtrip_for_every_kind() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let mut service = EventService::new(repo);

    let cases = [
        (
            "meal",
            json!({
                "foods": ["oatmeal, steel cut", "blueberries"],
                "calories": 320.5,
                "protein": 11,
                "carbohydrates": 54.25,
                "fats": 0
            }),
        ),
        ("exercise", json!({"type": "cycling", "duration_minutes": 42.5})),
        (
            "symptom",
            json!({"description": "mild cramping", "severity": "mild"}),
        ),
    ];

    for (index, (event_type, data)) in cases.into_iter().enumerate() {
        let timestamp = t(6) + Duration::microseconds(i64::try_from(index).unwrap() * 7);
        let id = service
            .create_event(&new_event(timestamp, event_type, data.clone()))
            .unwrap();

        let event = service.get_event(id).unwrap();
        assert_eq!(event.event_id, id);
        assert_eq!(event.timestamp, timestamp);
        assert_eq!(event.kind().as_str(), event_type);

        let rendered = serde_json::to_value(&event.payload).unwrap();
        let expected = gutiq_core::registry::resolve(event_type)
            .unwrap()
            .validate(&data)
            .unwrap();
        assert_eq!(event.payload, expected);
        assert_eq!(rendered["event_type"], event_type);
    }
}

#[test]
fn food_items_containing_commas_survive_storage() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let mut service = EventService::new(repo);

    let payload = EventPayload::Meal(MealData::with_foods(["mac, and cheese", "salad"]));
    let id = service.record(t(12), &payload).unwrap();

    assert_eq!(service.get_event(id).unwrap().payload, payload);
}

#[test]
fn listing_orders_by_timestamp_descending() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let mut service = EventService::new(repo);

    let mut created = Vec::new();
    for hour in [10, 3, 22, 7, 15] {
        let id = service
            .create_event(&new_event(
                t(hour),
                "symptom",
                json!({"description": format!("check-in {hour}"), "severity": "moderate"}),
            ))
            .unwrap();
        created.push((t(hour), id));
    }
    created.sort_by(|a, b| b.0.cmp(&a.0));

    let listed: Vec<_> = service
        .list_events()
        .unwrap()
        .into_iter()
        .map(|event| (event.timestamp, event.event_id))
        .collect();
    assert_eq!(listed, created);
}

#[test]
fn listing_breaks_timestamp_ties_by_event_id() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let mut service = EventService::new(repo);

    let payload = EventPayload::Meal(MealData::with_foods(["apple"]));
    let mut ids: Vec<_> = (0..4)
        .map(|_| service.record(t(9), &payload).unwrap())
        .collect();
    ids.sort_by_key(|id| id.to_string());

    let listed: Vec<_> = service
        .list_events()
        .unwrap()
        .into_iter()
        .map(|event| event.event_id)
        .collect();
    assert_eq!(listed, ids);
}

#[test]
fn mismatched_payload_is_rejected_and_nothing_is_persisted() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let mut service = EventService::new(repo);

        let err = service
            .create_event(&new_event(
                t(8),
                "meal",
                json!({"type": "running", "duration_minutes": 30}),
            ))
            .unwrap_err();
        match err {
            EventError::InvalidPayload(violations) => {
                assert_eq!(violations.kind, EventKind::Meal);
                assert_eq!(violations.fields()[0], "foods");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(count_rows(&conn, "events"), 0);
    assert_eq!(count_rows(&conn, "meals"), 0);
}

#[test]
fn unknown_event_type_is_rejected_on_create() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let mut service = EventService::new(repo);

        let err = service
            .create_event(&new_event(t(8), "sleep", json!({"hours": 8})))
            .unwrap_err();
        assert!(matches!(err, EventError::UnknownEventType(ref unknown) if unknown.0 == "sleep"));
    }

    assert_eq!(count_rows(&conn, "events"), 0);
}

#[test]
fn invalid_field_values_are_rejected_with_field_names() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let mut service = EventService::new(repo);

    let cases = [
        ("meal", json!({"foods": []}), "foods"),
        ("meal", json!({"foods": ["rice"], "protein": -2}), "protein"),
        (
            "exercise",
            json!({"type": "running", "duration_minutes": 0}),
            "duration_minutes",
        ),
        ("exercise", json!({"type": "", "duration_minutes": 10}), "type"),
        (
            "symptom",
            json!({"description": "headache", "severity": "unbearable"}),
            "severity",
        ),
    ];

    for (event_type, data, field) in cases {
        let err = service
            .create_event(&new_event(t(8), event_type, data))
            .unwrap_err();
        match err {
            EventError::InvalidPayload(violations) => {
                assert_eq!(violations.fields(), vec![field], "{event_type}");
                assert!(violations.to_string().contains(field));
            }
            other => panic!("unexpected error for {event_type}: {other}"),
        }
    }
}

#[test]
fn failed_extension_insert_leaves_no_envelope() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_meal_insert BEFORE INSERT ON meals
         BEGIN
             SELECT RAISE(ABORT, 'injected meal failure');
         END;",
    )
    .unwrap();

    {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let mut service = EventService::new(repo);

        let err = service
            .create_event(&new_event(t(8), "meal", json!({"foods": ["rice"]})))
            .unwrap_err();
        assert!(matches!(err, EventError::Repo(RepoError::Db(_))));
        assert!(err.to_string().contains("injected meal failure"));

        assert!(service.list_events().unwrap().is_empty());
    }

    assert_eq!(count_rows(&conn, "events"), 0);
    assert_eq!(count_rows(&conn, "meals"), 0);

    // The connection stays usable for other kinds after the rollback.
    let mut repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let payload = EventPayload::Exercise(gutiq_core::ExerciseData {
        kind: "walking".to_string(),
        duration_minutes: 20.0,
    });
    repo.insert_event(t(9), &payload).unwrap();
    assert_eq!(count_rows(&conn, "events"), 1);
}

#[test]
fn deleting_an_event_cascades_to_its_extension() {
    let mut conn = open_db_in_memory().unwrap();
    let (kept, deleted) = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let mut service = EventService::new(repo);
        let kept = service
            .create_event(&new_event(
                t(8),
                "symptom",
                json!({"description": "nausea", "severity": "severe"}),
            ))
            .unwrap();
        let deleted = service
            .create_event(&new_event(
                t(9),
                "symptom",
                json!({"description": "reflux", "severity": "mild"}),
            ))
            .unwrap();

        service.delete_event(deleted).unwrap();
        let err = service.delete_event(deleted).unwrap_err();
        assert!(matches!(err, EventError::NotFound(id) if id == deleted));
        (kept, deleted)
    };

    assert_eq!(count_rows(&conn, "events"), 1);
    assert_eq!(count_rows(&conn, "symptoms"), 1);
    let orphans: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM symptoms WHERE event_id = ?1;",
            [deleted.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let service = EventService::new(repo);
    let remaining = service.get_event(kept).unwrap();
    match remaining.payload {
        EventPayload::Symptom(symptom) => assert_eq!(symptom.severity, Severity::Severe),
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn missing_extension_is_skipped_in_listing_but_reported_on_fetch() {
    let mut conn = open_db_in_memory().unwrap();
    let (broken, intact) = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let mut service = EventService::new(repo);
        let broken = service
            .create_event(&new_event(t(10), "meal", json!({"foods": ["toast"]})))
            .unwrap();
        let intact = service
            .create_event(&new_event(
                t(11),
                "exercise",
                json!({"type": "swimming", "duration_minutes": 25}),
            ))
            .unwrap();
        (broken, intact)
    };

    conn.execute(
        "DELETE FROM meals WHERE event_id = ?1;",
        [broken.to_string()],
    )
    .unwrap();

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let service = EventService::new(repo);

    let listed: Vec<_> = service
        .list_events()
        .unwrap()
        .into_iter()
        .map(|event| event.event_id)
        .collect();
    assert_eq!(listed, vec![intact]);

    let err = service.get_event(broken).unwrap_err();
    match err {
        EventError::DataIntegrity { event_id, kind } => {
            assert_eq!(event_id, broken);
            assert_eq!(kind, EventKind::Meal);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_stored_type_is_skipped_in_listing_but_rejected_on_fetch() {
    let mut conn = open_db_in_memory().unwrap();
    let stray = Uuid::new_v4();
    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type) VALUES (?1, ?2, 'sleep');",
        params![stray.to_string(), 0_i64],
    )
    .unwrap();

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let mut service = EventService::new(repo);
    let payload = EventPayload::Meal(MealData::with_foods(["soup"]));
    let meal = service.record(t(5), &payload).unwrap();

    let listed: Vec<_> = service
        .list_events()
        .unwrap()
        .into_iter()
        .map(|event| event.event_id)
        .collect();
    assert_eq!(listed, vec![meal]);

    let err = service.get_event(stray).unwrap_err();
    assert!(matches!(err, EventError::UnknownEventType(ref unknown) if unknown.0 == "sleep"));
}

#[test]
fn corrupt_extension_row_fails_listing_instead_of_being_skipped() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let mut service = EventService::new(repo);
        service
            .record(t(7), &EventPayload::Meal(MealData::with_foods(["eggs"])))
            .unwrap()
    };
    conn.execute(
        "UPDATE meals SET foods = 'eggs,bacon' WHERE event_id = ?1;",
        [id.to_string()],
    )
    .unwrap();

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let service = EventService::new(repo);
    let err = service.list_events().unwrap_err();
    assert!(matches!(err, EventError::Repo(RepoError::InvalidData(_))));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    let result = SqliteEventRepository::try_new(&mut conn);
    match result {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_extension_table() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         CREATE TABLE events (event_id TEXT PRIMARY KEY, timestamp INTEGER, event_type TEXT);
         CREATE TABLE meals (event_id TEXT PRIMARY KEY);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let result = SqliteEventRepository::try_new(&mut conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("exercises"))
    ));
}

#[test]
fn repository_rejects_connection_with_foreign_keys_disabled() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();

    let result = SqliteEventRepository::try_new(&mut conn);
    assert!(matches!(result, Err(RepoError::ForeignKeysDisabled)));
}
