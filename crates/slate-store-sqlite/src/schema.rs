//! SQL schema for the Slate SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Id lists and maps are stored as JSON arrays and objects and queried with
/// `json_each`. Dates are `YYYY-MM-DD`, times `HH:MM:SS`, so both sort as
/// text.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS schools (
    school_id              TEXT PRIMARY KEY,
    name                   TEXT NOT NULL,
    currency               TEXT NOT NULL,
    reschedule_time_limit  INTEGER NOT NULL DEFAULT 0,  -- hours
    schedule_time_limit    INTEGER NOT NULL DEFAULT 0,  -- hours
    notification_templates TEXT NOT NULL DEFAULT '{}',
    admin_ids              TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS instructors (
    instructor_id TEXT PRIMARY KEY,
    school_id     TEXT NOT NULL,
    name          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    student_id TEXT PRIMARY KEY,
    school_id  TEXT NOT NULL,
    name       TEXT NOT NULL,
    birth_date TEXT,
    parent_ids TEXT NOT NULL DEFAULT '[]'
);

-- date, start_time and end_time are all set or all NULL.
CREATE TABLE IF NOT EXISTS lessons (
    lesson_id           TEXT PRIMARY KEY,
    kind                TEXT NOT NULL,   -- JSON-encoded LessonKind
    date                TEXT,
    start_time          TEXT,
    end_time            TEXT,
    duration_minutes    INTEGER NOT NULL,
    school_id           TEXT NOT NULL,
    sport_id            TEXT,
    location_id         TEXT,
    instructor_ids      TEXT NOT NULL DEFAULT '[]',
    student_ids         TEXT NOT NULL DEFAULT '[]',
    is_done             INTEGER NOT NULL DEFAULT 0,
    is_cancelled        INTEGER NOT NULL DEFAULT 0,
    pack_id             TEXT,
    needs_calendar_sync INTEGER NOT NULL DEFAULT 0,
    last_calendar_sync  TEXT,            -- RFC 3339 UTC
    calendar_event_ids  TEXT NOT NULL DEFAULT '{}',
    CHECK ((date IS NULL) = (start_time IS NULL)),
    CHECK ((date IS NULL) = (end_time IS NULL))
);

CREATE TABLE IF NOT EXISTS activities (
    activity_id    TEXT PRIMARY KEY,
    school_id      TEXT NOT NULL,
    name           TEXT NOT NULL,
    date           TEXT NOT NULL,
    start_time     TEXT NOT NULL,
    end_time       TEXT NOT NULL,
    instructor_ids TEXT NOT NULL DEFAULT '[]',
    student_ids    TEXT NOT NULL DEFAULT '[]',
    monitor_ids    TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS packs (
    pack_id                TEXT PRIMARY KEY,
    kind                   TEXT NOT NULL,   -- 'private' | 'group'
    date                   TEXT NOT NULL,
    number_of_classes      INTEGER NOT NULL,
    number_of_classes_left INTEGER NOT NULL,
    duration_minutes       INTEGER NOT NULL,
    price                  REAL NOT NULL,
    debt                   REAL NOT NULL,
    is_done                INTEGER NOT NULL,
    is_paid                INTEGER NOT NULL,
    is_suspended           INTEGER NOT NULL DEFAULT 0,
    expiration_date        TEXT,
    student_ids            TEXT NOT NULL DEFAULT '[]',
    parent_ids             TEXT NOT NULL DEFAULT '[]',
    instructor_id          TEXT,
    sport_id               TEXT,
    school_id              TEXT NOT NULL,
    CHECK (number_of_classes_left BETWEEN 0 AND number_of_classes)
);

CREATE TABLE IF NOT EXISTS class_tickets (
    ticket_id  TEXT PRIMARY KEY,
    pack_id    TEXT NOT NULL,
    lesson_id  TEXT,
    student_id TEXT
);

CREATE TABLE IF NOT EXISTS unavailabilities (
    unavailability_id TEXT PRIMARY KEY,
    actor_kind        TEXT NOT NULL,   -- 'instructor' | 'student'
    actor_id          TEXT NOT NULL,
    date              TEXT NOT NULL,
    start_time        TEXT NOT NULL,
    end_time          TEXT NOT NULL,
    duration_minutes  INTEGER NOT NULL,
    school_id         TEXT
);

CREATE INDEX IF NOT EXISTS instructors_school_idx ON instructors(school_id);
CREATE INDEX IF NOT EXISTS lessons_date_idx       ON lessons(date);
CREATE INDEX IF NOT EXISTS lessons_pack_idx       ON lessons(pack_id);
CREATE INDEX IF NOT EXISTS activities_date_idx    ON activities(date);
CREATE INDEX IF NOT EXISTS tickets_pack_idx       ON class_tickets(pack_id);
CREATE INDEX IF NOT EXISTS tickets_lesson_idx     ON class_tickets(lesson_id);
CREATE INDEX IF NOT EXISTS unavailability_actor_idx
    ON unavailabilities(actor_kind, actor_id, date);

PRAGMA user_version = 1;
";
