//! Local system of record on SQLite.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use enrolgroup_core::{
    CourseDirectory, CourseId, EnrolledUser, GroupChanges, GroupId, GroupRow, GroupStore,
    InstanceId, LocalError, MembershipStore, NewGroup, OwnerTag, UserId,
};

use crate::error::{backend, open_err, SqliteError};
use crate::schema::{self, SYNC_ENROL_PLUGIN};

pub struct SqliteLocalStore {
    conn: Connection,
}

impl SqliteLocalStore {
    /// Open (creating if needed) the local database and bootstrap its schema.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        let conn = Connection::open(path).map_err(|e| open_err(path, e))?;
        schema::bootstrap(&conn)?;
        tracing::debug!("opened local store {}", path.display());
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, SqliteError> {
        let conn = Connection::open_in_memory()?;
        schema::bootstrap(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // -----------------------------------------------------------------------
    // Provisioning
    // -----------------------------------------------------------------------

    pub fn insert_course(&self, shortname: &str, idnumber: &str) -> Result<CourseId, SqliteError> {
        self.conn.execute(
            "INSERT INTO course (shortname, idnumber) VALUES (?1, ?2)",
            params![shortname, idnumber],
        )?;
        Ok(CourseId(self.conn.last_insert_rowid()))
    }

    /// Add an enrolment instance of `plugin` to a course.
    pub fn add_enrol_instance(
        &self,
        course: CourseId,
        plugin: &str,
    ) -> Result<InstanceId, SqliteError> {
        self.conn.execute(
            "INSERT INTO enrol (courseid, enrol) VALUES (?1, ?2)",
            params![course.0, plugin],
        )?;
        Ok(InstanceId(self.conn.last_insert_rowid()))
    }

    /// Add the database enrolment instance that owns synced groups.
    pub fn add_sync_instance(&self, course: CourseId) -> Result<InstanceId, SqliteError> {
        self.add_enrol_instance(course, SYNC_ENROL_PLUGIN)
    }

    pub fn insert_user(&self, username: &str, idnumber: &str) -> Result<UserId, SqliteError> {
        self.conn.execute(
            r#"INSERT INTO "user" (username, idnumber) VALUES (?1, ?2)"#,
            params![username, idnumber],
        )?;
        Ok(UserId(self.conn.last_insert_rowid()))
    }

    pub fn enrol_user(&self, instance: InstanceId, user: UserId) -> Result<(), SqliteError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO user_enrolments (enrolid, userid) VALUES (?1, ?2)",
            params![instance.0, user.0],
        )?;
        Ok(())
    }

    /// Members of a group with the ownership tag of each membership.
    pub fn members(&self, group: GroupId) -> Result<Vec<(UserId, OwnerTag)>, SqliteError> {
        let mut stmt = self.conn.prepare(
            "SELECT userid, component, itemid FROM groups_members
             WHERE groupid = ?1 ORDER BY userid",
        )?;
        let rows = stmt.query_map(params![group.0], |row| {
            Ok((
                UserId(row.get(0)?),
                OwnerTag {
                    component: row.get(1)?,
                    item_id: row.get(2)?,
                },
            ))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl CourseDirectory for SqliteLocalStore {
    fn course_idnumbers(&self) -> Result<Vec<(String, CourseId)>, LocalError> {
        let mut stmt = self
            .conn
            .prepare("SELECT idnumber, id FROM course ORDER BY id")
            .map_err(backend)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, CourseId(row.get(1)?))))
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn sync_instance(&self, course: CourseId) -> Result<Option<InstanceId>, LocalError> {
        self.conn
            .query_row(
                "SELECT id FROM enrol WHERE courseid = ?1 AND enrol = ?2 ORDER BY id LIMIT 1",
                params![course.0, SYNC_ENROL_PLUGIN],
                |row| row.get(0).map(InstanceId),
            )
            .optional()
            .map_err(backend)
    }

    fn enrolled_users(&self, course: CourseId) -> Result<Vec<EnrolledUser>, LocalError> {
        let mut stmt = self
            .conn
            .prepare(
                r#"SELECT DISTINCT u.id, u.username, u.idnumber
                   FROM "user" u
                   JOIN user_enrolments ue ON ue.userid = u.id
                   JOIN enrol e ON e.id = ue.enrolid
                   WHERE e.courseid = ?1 AND u.deleted = 0
                   ORDER BY u.username"#,
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![course.0], |row| {
                Ok(EnrolledUser {
                    id: UserId(row.get(0)?),
                    username: row.get(1)?,
                    idnumber: row.get(2)?,
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }
}

impl GroupStore for SqliteLocalStore {
    fn list_groups(&self, course: CourseId) -> Result<Vec<GroupRow>, LocalError> {
        let mut stmt = self
            .conn
            .prepare(
                r#"SELECT id, idnumber, name, component, itemid FROM "groups"
                   WHERE courseid = ?1 ORDER BY id"#,
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![course.0], |row| {
                Ok(GroupRow {
                    id: GroupId(row.get(0)?),
                    idnumber: row.get(1)?,
                    name: row.get(2)?,
                    component: row.get(3)?,
                    item_id: row.get(4)?,
                })
            })
            .map_err(backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(backend)
    }

    fn create_group(&mut self, group: &NewGroup) -> Result<GroupId, LocalError> {
        self.conn
            .execute(
                r#"INSERT INTO "groups" (courseid, idnumber, name, component, itemid)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
                params![
                    group.course.0,
                    group.idnumber.as_str(),
                    group.name,
                    group.owner.component,
                    group.owner.item_id
                ],
            )
            .map_err(backend)?;
        let id = GroupId(self.conn.last_insert_rowid());
        tracing::info!("created group {id} ({}) in course {}", group.idnumber, group.course);
        Ok(id)
    }

    fn update_group(&mut self, id: GroupId, changes: &GroupChanges) -> Result<(), LocalError> {
        let changed = self
            .conn
            .execute(
                r#"UPDATE "groups" SET name = ?1 WHERE id = ?2"#,
                params![changes.name, id.0],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(LocalError::NotFound {
                kind: "group",
                id: id.0,
            });
        }
        tracing::info!("renamed group {id} to {}", changes.name);
        Ok(())
    }

    fn delete_group(&mut self, id: GroupId) -> Result<(), LocalError> {
        let tx = self.conn.transaction().map_err(backend)?;
        tx.execute("DELETE FROM groups_members WHERE groupid = ?1", params![id.0])
            .map_err(backend)?;
        let deleted = tx
            .execute(r#"DELETE FROM "groups" WHERE id = ?1"#, params![id.0])
            .map_err(backend)?;
        if deleted == 0 {
            return Err(LocalError::NotFound {
                kind: "group",
                id: id.0,
            });
        }
        tx.commit().map_err(backend)?;
        tracing::info!("deleted group {id}");
        Ok(())
    }
}

impl MembershipStore for SqliteLocalStore {
    fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, LocalError> {
        self.conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM groups_members WHERE groupid = ?1 AND userid = ?2)",
                params![group.0, user.0],
                |row| row.get(0),
            )
            .map_err(backend)
    }

    fn add_member(
        &mut self,
        group: GroupId,
        user: UserId,
        owner: &OwnerTag,
    ) -> Result<(), LocalError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO groups_members (groupid, userid, component, itemid)
                 VALUES (?1, ?2, ?3, ?4)",
                params![group.0, user.0, owner.component, owner.item_id],
            )
            .map_err(backend)?;
        tracing::info!("added user {user} to group {group}");
        Ok(())
    }

    fn remove_member(&mut self, group: GroupId, user: UserId) -> Result<(), LocalError> {
        self.conn
            .execute(
                "DELETE FROM groups_members WHERE groupid = ?1 AND userid = ?2",
                params![group.0, user.0],
            )
            .map_err(backend)?;
        tracing::info!("removed user {user} from group {group}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrolgroup_core::IdNumber;

    fn store_with_course() -> (SqliteLocalStore, CourseId, InstanceId) {
        let store = SqliteLocalStore::in_memory().unwrap();
        let course = store.insert_course("CX", "courseX").unwrap();
        let instance = store.add_sync_instance(course).unwrap();
        (store, course, instance)
    }

    fn new_group(course: CourseId, instance: InstanceId, idnumber: &str, name: &str) -> NewGroup {
        NewGroup {
            course,
            idnumber: IdNumber::parse(idnumber).unwrap(),
            name: name.to_string(),
            owner: OwnerTag::for_instance(instance),
        }
    }

    #[test]
    fn sync_instance_ignores_other_plugins() {
        let store = SqliteLocalStore::in_memory().unwrap();
        let course = store.insert_course("CX", "courseX").unwrap();
        store.add_enrol_instance(course, "manual").unwrap();
        assert_eq!(store.sync_instance(course).unwrap(), None);

        let instance = store.add_sync_instance(course).unwrap();
        assert_eq!(store.sync_instance(course).unwrap(), Some(instance));
    }

    #[test]
    fn enrolled_users_are_distinct_and_ordered_by_username() {
        let (store, course, instance) = store_with_course();
        let manual = store.add_enrol_instance(course, "manual").unwrap();
        let zed = store.insert_user("zed", "u9").unwrap();
        let amy = store.insert_user("amy", "").unwrap();
        store.insert_user("outsider", "u5").unwrap();
        store.enrol_user(instance, zed).unwrap();
        store.enrol_user(manual, zed).unwrap();
        store.enrol_user(manual, amy).unwrap();

        let users = store.enrolled_users(course).unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "zed"]);
    }

    #[test]
    fn group_crud_carries_the_owner_tag() {
        let (mut store, course, instance) = store_with_course();
        let id = store
            .create_group(&new_group(course, instance, "g1", "Alpha"))
            .unwrap();
        store
            .update_group(id, &GroupChanges { name: "AlphaX".into() })
            .unwrap();

        let groups = store.list_groups(course).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "AlphaX");
        assert_eq!(groups[0].component, OwnerTag::COMPONENT);
        assert_eq!(groups[0].item_id, instance.0);
    }

    #[test]
    fn delete_group_removes_memberships() {
        let (mut store, course, instance) = store_with_course();
        let user = store.insert_user("anna", "u1").unwrap();
        let id = store
            .create_group(&new_group(course, instance, "g1", "Alpha"))
            .unwrap();
        store.add_member(id, user, &OwnerTag::membership()).unwrap();

        store.delete_group(id).unwrap();
        assert!(store.list_groups(course).unwrap().is_empty());
        assert!(store.members(id).unwrap().is_empty());
    }

    #[test]
    fn missing_group_is_not_found() {
        let (mut store, _, _) = store_with_course();
        assert!(matches!(
            store.delete_group(GroupId(404)),
            Err(LocalError::NotFound { kind: "group", id: 404 })
        ));
        assert!(matches!(
            store.update_group(GroupId(404), &GroupChanges { name: "x".into() }),
            Err(LocalError::NotFound { .. })
        ));
    }

    #[test]
    fn membership_add_is_idempotent_and_remove_works() {
        let (mut store, course, instance) = store_with_course();
        let user = store.insert_user("anna", "u1").unwrap();
        let id = store
            .create_group(&new_group(course, instance, "g1", "Alpha"))
            .unwrap();
        let owner = OwnerTag::membership();

        store.add_member(id, user, &owner).unwrap();
        store.add_member(id, user, &owner).unwrap();
        assert!(store.is_member(id, user).unwrap());
        assert_eq!(store.members(id).unwrap(), vec![(user, owner)]);

        store.remove_member(id, user).unwrap();
        assert!(!store.is_member(id, user).unwrap());
    }
}
