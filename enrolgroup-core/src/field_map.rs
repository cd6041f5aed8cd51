//! Field mapper: configured column names → query projections → canonical records.
//!
//! Every remote query selects `remote-column AS logical-name`, so rows can be
//! read back by logical name regardless of how the remote table is laid out.
//! Column names coming back from a driver are lower-cased before lookup;
//! some engines upper-case aliases.
//!
//! Filter values are never spliced into the SQL text. [`SelectQuery::to_sql`]
//! emits `?N` placeholders and [`SelectQuery::params`] returns the values in
//! the same order.
//!
//! Projected and filtered columns are both wrapped in `CAST(.. AS TEXT)`.
//! Idnumbers are text on our side, and a bound text parameter never equals an
//! integer cell in a column without declared affinity, so the comparison has
//! to happen on the same text form the rows are read back as.

use std::collections::HashMap;

use crate::config::{GroupsMapping, MembersMapping};
use crate::types::{IdNumber, RemoteGroupRecord, RemoteMembershipRecord};

/// Logical field names used as projection aliases.
pub mod logical {
    pub const COURSE_IDNUMBER: &str = "courseidnumber";
    pub const GROUP_IDNUMBER: &str = "groupidnumber";
    pub const GROUP_NAME: &str = "name";
    pub const USER_IDNUMBER: &str = "useridnumber";
}

// ---------------------------------------------------------------------------
// Query construction
// ---------------------------------------------------------------------------

/// One projected column: `column AS alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub column: String,
    pub alias: &'static str,
}

/// A read-only `SELECT` against one remote table with equality filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: String,
    pub projection: Vec<Projection>,
    /// `(column, value)` pairs joined with `AND`.
    pub filters: Vec<(String, String)>,
    pub distinct: bool,
}

impl SelectQuery {
    /// Render the statement with positional placeholders.
    pub fn to_sql(&self) -> String {
        let fields = if self.projection.is_empty() {
            "*".to_string()
        } else {
            self.projection
                .iter()
                .map(|p| format!("{} AS {}", as_text(&p.column), p.alias))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        let mut sql = format!("SELECT {distinct}{fields} FROM {}", self.table);
        if !self.filters.is_empty() {
            let clauses: Vec<String> = self
                .filters
                .iter()
                .enumerate()
                .map(|(i, (column, _))| format!("{} = ?{}", as_text(column), i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql
    }

    /// Filter values, in placeholder order.
    pub fn params(&self) -> Vec<&str> {
        self.filters.iter().map(|(_, v)| v.as_str()).collect()
    }
}

fn as_text(column: &str) -> String {
    format!("CAST({column} AS TEXT)")
}

/// Distinct course idnumbers present in the groups table.
pub fn courses_query(groups: &GroupsMapping) -> SelectQuery {
    SelectQuery {
        table: groups.table().to_string(),
        projection: vec![Projection {
            column: groups.course_column().to_string(),
            alias: logical::COURSE_IDNUMBER,
        }],
        filters: vec![],
        distinct: true,
    }
}

/// All group rows for one course.
pub fn groups_query(groups: &GroupsMapping, course: &IdNumber) -> SelectQuery {
    SelectQuery {
        table: groups.table().to_string(),
        projection: vec![
            Projection {
                column: groups.course_column().to_string(),
                alias: logical::COURSE_IDNUMBER,
            },
            Projection {
                column: groups.group_column().to_string(),
                alias: logical::GROUP_IDNUMBER,
            },
            Projection {
                column: groups.name_column().to_string(),
                alias: logical::GROUP_NAME,
            },
        ],
        filters: vec![(groups.course_column().to_string(), course.to_string())],
        distinct: false,
    }
}

/// All membership rows for one group of one course.
pub fn members_query(members: &MembersMapping, course: &IdNumber, group: &IdNumber) -> SelectQuery {
    SelectQuery {
        table: members.table().to_string(),
        projection: vec![
            Projection {
                column: members.course_column().to_string(),
                alias: logical::COURSE_IDNUMBER,
            },
            Projection {
                column: members.group_column().to_string(),
                alias: logical::GROUP_IDNUMBER,
            },
            Projection {
                column: members.user_column().to_string(),
                alias: logical::USER_IDNUMBER,
            },
        ],
        filters: vec![
            (members.course_column().to_string(), course.to_string()),
            (members.group_column().to_string(), group.to_string()),
        ],
        distinct: false,
    }
}

// ---------------------------------------------------------------------------
// Row normalization
// ---------------------------------------------------------------------------

/// A fetched row keyed by lower-cased column label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRow {
    values: HashMap<String, Option<String>>,
}

impl NormalizedRow {
    /// Build from `(label, value)` pairs as a driver reports them.
    pub fn from_columns<I, K>(columns: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: AsRef<str>,
    {
        let values = columns
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v))
            .collect();
        Self { values }
    }

    /// Text of a field, or `None` when it is absent or NULL.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .get(&field.to_lowercase())
            .and_then(|v| v.as_deref())
    }

    /// A field parsed as an idnumber; blank values yield `None`.
    pub fn idnumber(&self, field: &str) -> Option<IdNumber> {
        self.get(field).and_then(IdNumber::parse)
    }
}

/// Course idnumber from a [`courses_query`] row.
pub fn course_from_row(row: &NormalizedRow) -> Option<IdNumber> {
    row.idnumber(logical::COURSE_IDNUMBER)
}

/// Group record from a [`groups_query`] row; rows without name or idnumber are dropped.
pub fn group_from_row(row: &NormalizedRow, course: &IdNumber) -> Option<RemoteGroupRecord> {
    let group_idnumber = row.idnumber(logical::GROUP_IDNUMBER)?;
    let name = row.get(logical::GROUP_NAME).filter(|n| !n.is_empty())?;
    Some(RemoteGroupRecord {
        course_idnumber: course.clone(),
        group_idnumber,
        name: name.to_string(),
    })
}

/// Membership record from a [`members_query`] row; rows without a user idnumber are dropped.
pub fn member_from_row(
    row: &NormalizedRow,
    course: &IdNumber,
    group: &IdNumber,
) -> Option<RemoteMembershipRecord> {
    let user_idnumber = row.idnumber(logical::USER_IDNUMBER)?;
    Some(RemoteMembershipRecord {
        course_idnumber: course.clone(),
        group_idnumber: group.clone(),
        user_idnumber,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> IdNumber {
        IdNumber::parse(s).unwrap()
    }

    fn groups_mapping() -> GroupsMapping {
        GroupsMapping {
            table: " ext_groups ".into(),
            course_idnumber: "COURSE_CODE".into(),
            group_idnumber: "group_code".into(),
            name: " title ".into(),
        }
    }

    #[test]
    fn courses_query_is_distinct_projection() {
        let q = courses_query(&groups_mapping());
        assert_eq!(
            q.to_sql(),
            "SELECT DISTINCT CAST(COURSE_CODE AS TEXT) AS courseidnumber FROM ext_groups"
        );
        assert!(q.params().is_empty());
    }

    #[test]
    fn groups_query_filters_by_course_with_placeholder() {
        let q = groups_query(&groups_mapping(), &id("courseX"));
        assert_eq!(
            q.to_sql(),
            "SELECT CAST(COURSE_CODE AS TEXT) AS courseidnumber, \
             CAST(group_code AS TEXT) AS groupidnumber, CAST(title AS TEXT) AS name \
             FROM ext_groups WHERE CAST(COURSE_CODE AS TEXT) = ?1"
        );
        assert_eq!(q.params(), vec!["courseX"]);
    }

    #[test]
    fn members_query_filters_by_course_and_group() {
        let members = MembersMapping {
            table: "ext_members".into(),
            ..MembersMapping::default()
        };
        let q = members_query(&members, &id("c'1"), &id("g1"));
        assert!(q.to_sql().ends_with(
            "WHERE CAST(courseidnumber AS TEXT) = ?1 AND CAST(groupidnumber AS TEXT) = ?2"
        ));
        assert_eq!(q.params(), vec!["c'1", "g1"]);
    }

    #[test]
    fn empty_projection_selects_star() {
        let q = SelectQuery {
            table: "t".into(),
            projection: vec![],
            filters: vec![],
            distinct: false,
        };
        assert_eq!(q.to_sql(), "SELECT * FROM t");
    }

    #[test]
    fn row_keys_are_case_insensitive() {
        let row = NormalizedRow::from_columns([
            ("GROUPIDNUMBER", Some("g1".to_string())),
            ("Name", Some("Alpha".to_string())),
        ]);
        let record = group_from_row(&row, &id("courseX")).expect("record");
        assert_eq!(record.group_idnumber, id("g1"));
        assert_eq!(record.name, "Alpha");
        assert_eq!(record.course_idnumber, id("courseX"));
    }

    #[test]
    fn group_rows_missing_name_or_idnumber_are_dropped() {
        let course = id("courseX");
        let no_name = NormalizedRow::from_columns([
            ("groupidnumber", Some("g1".to_string())),
            ("name", Some(String::new())),
        ]);
        let null_id = NormalizedRow::from_columns([
            ("groupidnumber", None),
            ("name", Some("Alpha".to_string())),
        ]);
        let blank_id = NormalizedRow::from_columns([
            ("groupidnumber", Some("  ".to_string())),
            ("name", Some("Alpha".to_string())),
        ]);
        assert!(group_from_row(&no_name, &course).is_none());
        assert!(group_from_row(&null_id, &course).is_none());
        assert!(group_from_row(&blank_id, &course).is_none());
    }

    #[test]
    fn member_rows_missing_user_are_dropped() {
        let row = NormalizedRow::from_columns([("useridnumber", Some(String::new()))]);
        assert!(member_from_row(&row, &id("c"), &id("g")).is_none());

        let row = NormalizedRow::from_columns([("UserIdNumber", Some("u1".to_string()))]);
        let record = member_from_row(&row, &id("c"), &id("g")).expect("record");
        assert_eq!(record.user_idnumber, id("u1"));
    }

    #[test]
    fn blank_course_rows_are_dropped() {
        let row = NormalizedRow::from_columns([("courseidnumber", Some(" ".to_string()))]);
        assert!(course_from_row(&row).is_none());
    }
}
