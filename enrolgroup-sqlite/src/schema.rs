//! Local database schema.
//!
//! Table and column names follow the system of record the reconciler was
//! built against: `groups.component` / `groups.itemid` carry the ownership
//! tag, `enrol.enrol` names the enrolment plugin of an instance.

use rusqlite::Connection;

use crate::error::SqliteError;

/// Enrolment plugin whose instance owns synced groups.
pub const SYNC_ENROL_PLUGIN: &str = "database";

const LOCAL_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS course (
    id        INTEGER PRIMARY KEY,
    shortname TEXT NOT NULL DEFAULT '',
    idnumber  TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS enrol (
    id       INTEGER PRIMARY KEY,
    courseid INTEGER NOT NULL REFERENCES course(id),
    enrol    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "user" (
    id       INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    idnumber TEXT NOT NULL DEFAULT '',
    deleted  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user_enrolments (
    id      INTEGER PRIMARY KEY,
    enrolid INTEGER NOT NULL REFERENCES enrol(id),
    userid  INTEGER NOT NULL REFERENCES "user"(id),
    UNIQUE (enrolid, userid)
);

CREATE TABLE IF NOT EXISTS "groups" (
    id        INTEGER PRIMARY KEY,
    courseid  INTEGER NOT NULL REFERENCES course(id),
    idnumber  TEXT NOT NULL DEFAULT '',
    name      TEXT NOT NULL,
    component TEXT NOT NULL DEFAULT '',
    itemid    INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS groups_courseid ON "groups" (courseid);

CREATE TABLE IF NOT EXISTS groups_members (
    id        INTEGER PRIMARY KEY,
    groupid   INTEGER NOT NULL REFERENCES "groups"(id),
    userid    INTEGER NOT NULL REFERENCES "user"(id),
    component TEXT NOT NULL DEFAULT '',
    itemid    INTEGER NOT NULL DEFAULT 0,
    UNIQUE (groupid, userid)
);
"#;

/// Enable foreign keys and create any missing local tables.
pub fn bootstrap(conn: &Connection) -> Result<(), SqliteError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(LOCAL_SCHEMA)?;
    Ok(())
}
