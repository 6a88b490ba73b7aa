use chrono::{DateTime, TimeZone, Utc};
use campus_core::cli::Invocation;
use campus_core::commands::dispatch_at;
use campus_core::config::Config;
use campus_core::datastore::{DataStore, SlotSource};
use campus_core::render::Renderer;
use tempfile::tempdir;

fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 16, 9, 30, 0)
        .single()
        .expect("valid monday")
}

fn run(store: &mut DataStore, cfg: &Config, line: &str, now: DateTime<Utc>) -> anyhow::Result<String> {
    let mut tokens = line.split_whitespace().map(str::to_string);
    let inv = Invocation {
        command: tokens.next().unwrap_or_default(),
        command_args: tokens.collect(),
    };
    let mut renderer = Renderer::plain();
    let mut out = Vec::new();
    dispatch_at(store, cfg, &mut renderer, inv, now, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn seed(store: &mut DataStore, cfg: &Config, now: DateTime<Utc>) {
    for line in [
        "class add 10A",
        "subject add Math",
        "subject add Physics",
        "teacher add Noor email:noor@school.test",
        "subject assign Math 10A",
        "subject assign Physics 10A",
        "slot add class:10A subject:Math day:mon band:1 teacher:Noor",
        "slot add class:10A subject:Physics day:1 time:10:00-12:00 room:Lab",
    ] {
        run(store, cfg, line, now).unwrap_or_else(|err| panic!("{line}: {err:#}"));
    }
}

#[test]
fn today_view_shows_live_status() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();
    seed(&mut store, &cfg, now);

    let today = run(&mut store, &cfg, "today", now).expect("today");
    let lines: Vec<&str> = today.lines().collect();
    assert_eq!(lines[0], "10A | Today (Monday)");
    assert!(lines[1].contains("Status"));
    assert!(lines[3].starts_with("08:00 - 10:00"));
    assert!(lines[3].contains("Math"));
    assert!(lines[3].contains("Noor"));
    assert!(lines[3].contains("30m left"));
    assert!(lines[4].contains("Physics"));
    assert!(lines[4].contains("starts in 30m"));

    let tomorrow = run(&mut store, &cfg, "tomorrow 10A", now).expect("tomorrow");
    assert_eq!(tomorrow, "10A | Tomorrow (Tuesday)\nNo classes scheduled.\n");

    let board = run(&mut store, &cfg, "now", now).expect("now");
    assert!(board.trim_end().ends_with("Now: Math (30m left)"));
}

#[test]
fn week_view_lays_out_bands_by_day() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();
    seed(&mut store, &cfg, now);
    run(&mut store, &cfg, "slot add subject:Math day:wed band:1", now).expect("wednesday slot");

    let week = run(&mut store, &cfg, "week", now).expect("week");
    let lines: Vec<&str> = week.lines().collect();
    assert_eq!(lines[0], "10A | Weekly timetable");
    assert!(lines[1].starts_with("Time"));
    assert!(lines[1].contains("Monday"));
    assert!(lines[1].contains("Wednesday"));
    assert!(!lines[1].contains("Tuesday"));
    assert!(lines[3].starts_with("08:00 - 10:00"));
    assert!(lines[4].contains("Physics (Lab)"));
    assert!(lines[4].trim_end().ends_with('-'));
    assert!(!week.contains("clash"));
}

#[test]
fn slot_modify_keeps_unspecified_fields() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();
    seed(&mut store, &cfg, now);

    let math = store
        .load_slots()
        .expect("load slots")
        .into_iter()
        .find(|slot| slot.classroom.is_none())
        .expect("math slot");
    let prefix = math.short_id();

    run(&mut store, &cfg, &format!("slot modify {prefix} day:tue room:B12"), now).expect("modify");

    let updated = store
        .load_slots()
        .expect("load slots")
        .into_iter()
        .find(|slot| slot.id == math.id)
        .expect("still present");
    assert_eq!(updated.day_of_week.name(), "Tuesday");
    assert_eq!(updated.classroom.as_deref(), Some("B12"));
    assert_eq!(updated.band(), math.band());
    assert_eq!(updated.teacher_id, math.teacher_id);

    let err = run(&mut store, &cfg, &format!("slot modify {prefix} start:11:00"), now)
        .expect_err("start after end");
    assert!(err.to_string().contains("must end after it starts"));
}

#[test]
fn deletes_cascade_to_slots() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();
    seed(&mut store, &cfg, now);

    run(&mut store, &cfg, "teacher delete Noor", now).expect("delete teacher");
    let slots = store.load_slots().expect("load slots");
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|slot| slot.teacher_id.is_none()));

    run(&mut store, &cfg, "subject delete Physics", now).expect("delete subject");
    assert_eq!(store.load_slots().expect("load slots").len(), 1);
    assert_eq!(store.load_class_subjects().expect("load links").len(), 1);

    run(&mut store, &cfg, "class delete 10A", now).expect("delete class");
    assert!(store.load_slots().expect("load slots").is_empty());
    assert!(store.load_class_subjects().expect("load links").is_empty());
    assert!(run(&mut store, &cfg, "today", now).is_err());
}

#[test]
fn slot_source_joins_names_for_a_class() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();
    seed(&mut store, &cfg, now);
    run(&mut store, &cfg, "class add 11B", now).expect("second class");
    run(&mut store, &cfg, "slot add class:11B subject:Math day:fri band:3", now).expect("11B slot");

    let classes = store.fetch_classes().expect("fetch classes");
    let ten_a = classes.iter().find(|class| class.name == "10A").expect("10A");

    let slots = store.fetch_slots_for_class(ten_a.id).expect("fetch slots");
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|slot| slot.class_name.as_deref() == Some("10A")));
    assert_eq!(slots[0].subject_name.as_deref(), Some("Math"));
    assert_eq!(slots[0].teacher_name.as_deref(), Some("Noor"));
    assert_eq!(slots[1].subject_name.as_deref(), Some("Physics"));
    assert_eq!(slots[1].teacher_name, None);

    assert_eq!(store.fetch_all_slots().expect("fetch all").len(), 3);
}

#[test]
fn export_writes_joined_json() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();
    seed(&mut store, &cfg, now);

    let exported = run(&mut store, &cfg, "export 10A", now).expect("export");
    let rows: Vec<serde_json::Value> = serde_json::from_str(&exported).expect("valid json");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["subject"], "Math");
    assert_eq!(rows[0]["day_of_week"], 1);
    assert_eq!(rows[0]["day_name"], "Monday");
    assert_eq!(rows[0]["start_time"], "08:00:00");
    assert_eq!(rows[1]["classroom"], "Lab");
    assert!(rows[1]["teacher"].is_null());
}

#[test]
fn rejects_duplicates_and_bad_slots() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();

    assert!(run(&mut store, &cfg, "week", now).is_err());
    seed(&mut store, &cfg, now);

    assert!(run(&mut store, &cfg, "class add 10a", now).is_err());
    assert!(run(&mut store, &cfg, "subject assign Math 10A", now).is_err());
    assert!(run(&mut store, &cfg, "slot add subject:Math day:mon", now).is_err());
    assert!(run(&mut store, &cfg, "slot add subject:Math day:9 band:1", now).is_err());
    assert!(run(&mut store, &cfg, "slot add subject:Math day:mon time:10:00-09:00", now).is_err());
    assert!(run(&mut store, &cfg, "slot add subject:Chemistry day:mon band:2", now).is_err());
    assert_eq!(store.load_slots().expect("load slots").len(), 2);

    run(&mut store, &cfg, "teacher add Sara", now).expect("second teacher");
    assert!(run(&mut store, &cfg, "teacher rename Sara noor", now).is_err());
    assert!(run(&mut store, &cfg, "teacher rename Sara Sara", now).is_ok());
    let names: Vec<String> = store
        .load_teachers()
        .expect("load teachers")
        .into_iter()
        .map(|teacher| teacher.full_name)
        .collect();
    assert_eq!(names, vec!["Noor".to_string(), "Sara".to_string()]);
}

#[cfg(unix)]
#[test]
fn failed_save_reports_no_success() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = Config::default();
    let now = monday_morning();
    seed(&mut store, &cfg, now);

    fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o555)).expect("lock data dir");
    let writable = temp.path().join("writable-check");
    if fs::write(&writable, "").is_ok() {
        // permissions are not enforced for this user (root)
        let _ = fs::remove_file(&writable);
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o755)).expect("unlock");
        return;
    }

    for line in [
        "class add 11B",
        "subject add Chemistry",
        "teacher add Sara",
        "subject unassign Physics 10A",
        "slot add subject:Math day:tue band:2",
    ] {
        let mut tokens = line.split_whitespace().map(str::to_string);
        let inv = Invocation {
            command: tokens.next().unwrap_or_default(),
            command_args: tokens.collect(),
        };
        let mut out = Vec::new();
        let result = dispatch_at(&mut store, &cfg, &mut Renderer::plain(), inv, now, &mut out);
        assert!(result.is_err(), "{line} should fail to save");
        assert!(out.is_empty(), "{line} printed {:?}", String::from_utf8_lossy(&out));
    }

    fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o755)).expect("unlock data dir");
    assert_eq!(store.load_classes().expect("load classes").len(), 1);
    assert_eq!(store.load_slots().expect("load slots").len(), 2);
}
