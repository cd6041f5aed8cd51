//! Remote reader over a SQLite database holding the external tables.
//!
//! The database is opened read-only. Each listing runs a fresh query built
//! by the field mapper. Columns are cast to text on both sides of the query,
//! so an integer idnumber reads back as text and its own text value matches
//! it again when passed as a filter.
//!
//! The first failed query closes the connection. Later reads in the same
//! run fail fast with [`RemoteError::ConnectionClosed`], so one broken
//! source fails every remaining course the same way.

use std::path::Path;

use rusqlite::{params_from_iter, types::ValueRef, Connection, OpenFlags};

use enrolgroup_core::{
    field_map::{self, NormalizedRow, SelectQuery},
    GroupsMapping, IdNumber, MembersMapping, RemoteError, RemoteGroupRecord,
    RemoteMembershipRecord, RemoteReader, SyncConfiguration,
};

use crate::error::{open_err, SqliteError};

pub struct SqliteRemoteSource {
    conn: Option<Connection>,
    groups: GroupsMapping,
    members: MembersMapping,
}

impl SqliteRemoteSource {
    /// Open an existing database file read-only.
    pub fn open(path: &Path, config: &SyncConfiguration) -> Result<Self, SqliteError> {
        if !path.exists() {
            return Err(SqliteError::Missing {
                path: path.to_path_buf(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| open_err(path, e))?;
        tracing::debug!("opened remote source {}", path.display());
        Ok(Self::from_connection(conn, config))
    }

    /// Wrap an already-open connection.
    pub fn from_connection(conn: Connection, config: &SyncConfiguration) -> Self {
        Self {
            conn: Some(conn),
            groups: config.groups.clone(),
            members: config.members.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn fetch(&mut self, query: &SelectQuery) -> Result<Vec<NormalizedRow>, RemoteError> {
        let conn = self.conn.as_ref().ok_or(RemoteError::ConnectionClosed)?;
        let result = execute(conn, query);
        result.map_err(|err| {
            tracing::warn!(
                "remote query on {} failed, closing connection: {err}",
                query.table
            );
            self.conn = None;
            RemoteError::Query {
                table: query.table.clone(),
                message: err.to_string(),
            }
        })
    }
}

fn execute(conn: &Connection, query: &SelectQuery) -> rusqlite::Result<Vec<NormalizedRow>> {
    let sql = query.to_sql();
    tracing::debug!("remote query: {sql}");
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt.query_map(params_from_iter(query.params()), |row| {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            columns.push((name.as_str(), as_text(row.get_ref(i)?)));
        }
        Ok(NormalizedRow::from_columns(columns))
    })?;
    rows.collect()
}

fn as_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

impl RemoteReader for SqliteRemoteSource {
    fn list_courses_with_groups(&mut self) -> Result<Vec<IdNumber>, RemoteError> {
        let query = field_map::courses_query(&self.groups);
        let rows = self.fetch(&query)?;
        Ok(rows.iter().filter_map(field_map::course_from_row).collect())
    }

    fn list_groups_for_course(
        &mut self,
        course: &IdNumber,
    ) -> Result<Vec<RemoteGroupRecord>, RemoteError> {
        let query = field_map::groups_query(&self.groups, course);
        let rows = self.fetch(&query)?;
        Ok(rows
            .iter()
            .filter_map(|row| field_map::group_from_row(row, course))
            .collect())
    }

    fn list_members_for_group(
        &mut self,
        course: &IdNumber,
        group: &IdNumber,
    ) -> Result<Vec<RemoteMembershipRecord>, RemoteError> {
        let query = field_map::members_query(&self.members, course, group);
        let rows = self.fetch(&query)?;
        Ok(rows
            .iter()
            .filter_map(|row| field_map::member_from_row(row, course, group))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> IdNumber {
        IdNumber::parse(s).unwrap()
    }

    fn config() -> SyncConfiguration {
        SyncConfiguration {
            groups: GroupsMapping {
                table: "ext_groups".into(),
                course_idnumber: "crs".into(),
                group_idnumber: "grp".into(),
                name: "title".into(),
            },
            members: MembersMapping {
                table: "ext_members".into(),
                course_idnumber: "crs".into(),
                group_idnumber: "grp".into(),
                user_idnumber: "usr".into(),
            },
            ..SyncConfiguration::default()
        }
    }

    fn source() -> SqliteRemoteSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE ext_groups (crs TEXT, grp, title TEXT);
             INSERT INTO ext_groups VALUES ('courseX', 'g1', 'Alpha');
             INSERT INTO ext_groups VALUES ('courseX', 7, 'Seven');
             INSERT INTO ext_groups VALUES ('courseX', NULL, 'No id');
             INSERT INTO ext_groups VALUES ('courseX', 'g3', '');
             INSERT INTO ext_groups VALUES ('courseY', 'g1', 'Other');
             INSERT INTO ext_groups VALUES (NULL, 'g9', 'Orphan row');
             CREATE TABLE ext_members (crs TEXT, grp, usr TEXT);
             INSERT INTO ext_members VALUES ('courseX', 'g1', 'u1');
             INSERT INTO ext_members VALUES ('courseX', 7, 'u7');
             INSERT INTO ext_members VALUES ('courseX', 'g1', '');
             INSERT INTO ext_members VALUES ('courseX', 'g2', 'u2');",
        )
        .unwrap();
        SqliteRemoteSource::from_connection(conn, &config())
    }

    #[test]
    fn lists_distinct_courses_skipping_nulls() {
        let mut src = source();
        let mut courses = src.list_courses_with_groups().unwrap();
        courses.sort();
        assert_eq!(courses, vec![id("courseX"), id("courseY")]);
    }

    #[test]
    fn groups_are_filtered_by_course_and_decoded_as_text() {
        let mut src = source();
        let groups = src.list_groups_for_course(&id("courseX")).unwrap();
        let ids: Vec<&str> = groups.iter().map(|g| g.group_idnumber.as_str()).collect();
        assert_eq!(ids, vec!["g1", "7"]);
        assert!(groups.iter().all(|g| g.course_idnumber == id("courseX")));
    }

    #[test]
    fn filter_values_are_bound_not_spliced() {
        let mut src = source();
        let groups = src
            .list_groups_for_course(&id("courseX' OR '1'='1"))
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn members_are_filtered_by_group() {
        let mut src = source();
        let members = src
            .list_members_for_group(&id("courseX"), &id("g1"))
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_idnumber, id("u1"));
    }

    #[test]
    fn integer_group_idnumbers_match_their_text_form() {
        let mut src = source();
        let groups = src.list_groups_for_course(&id("courseX")).unwrap();
        let seven = groups
            .iter()
            .find(|g| g.name == "Seven")
            .expect("group stored as integer");

        let members = src
            .list_members_for_group(&id("courseX"), &seven.group_idnumber)
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_idnumber, id("u7"));
    }

    #[test]
    fn integer_course_column_is_filtered_as_text() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE ext_groups (crs, grp, title TEXT);
             INSERT INTO ext_groups VALUES (101, 1, 'One');
             INSERT INTO ext_groups VALUES (102, 2, 'Two');",
        )
        .unwrap();
        let mut src = SqliteRemoteSource::from_connection(conn, &config());

        let courses = src.list_courses_with_groups().unwrap();
        assert!(courses.contains(&id("101")));
        let groups = src.list_groups_for_course(&id("101")).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group_idnumber, id("1"));
    }

    #[test]
    fn first_failure_closes_the_connection() {
        let mut cfg = config();
        cfg.members.table = "missing_table".into();
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE ext_groups (crs TEXT, grp TEXT, title TEXT);")
            .unwrap();
        let mut src = SqliteRemoteSource::from_connection(conn, &cfg);

        let err = src
            .list_members_for_group(&id("courseX"), &id("g1"))
            .unwrap_err();
        assert!(matches!(err, RemoteError::Query { ref table, .. } if table == "missing_table"));
        assert!(!src.is_open());
        assert!(matches!(
            src.list_courses_with_groups(),
            Err(RemoteError::ConnectionClosed)
        ));
    }

    #[test]
    fn opening_a_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SqliteRemoteSource::open(&dir.path().join("nope.db"), &config())
            .err()
            .unwrap();
        assert!(matches!(err, SqliteError::Missing { .. }));
    }
}
