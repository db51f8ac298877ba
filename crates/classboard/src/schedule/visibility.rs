//! Role-based narrowing of the canonical list, the class catalog offered by
//! entry forms, and the free-text search applied on top.

use super::client::ScheduleApi;
use super::config::EnrollmentFailurePolicy;
use super::error::ScheduleError;
use super::types::{Actor, CanonicalSchedule, ClassInfo, Role};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Reads class ids out of an enrollment response (`[{ "id": .. }, ..]`).
/// Entries may carry the id as `id` or `class_id`; a key that is null or not
/// an integer counts as missing.
pub fn enrolled_class_ids(value: &Value) -> Result<HashSet<i64>, ScheduleError> {
    let items = value.as_array().ok_or_else(|| ScheduleError::ShapeMismatch {
        source_name: "student classes",
        message: "expected an array of classes".to_string(),
    })?;
    Ok(items
        .iter()
        .filter_map(|item| {
            ["id", "class_id"]
                .iter()
                .find_map(|key| item.get(key).and_then(as_class_id))
        })
        .collect())
}

fn as_class_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Keeps only sessions whose class is in `enrolled`.
pub fn retain_enrolled(
    mut schedules: Vec<CanonicalSchedule>,
    enrolled: &HashSet<i64>,
) -> Vec<CanonicalSchedule> {
    schedules.retain(|s| enrolled.contains(&s.class_id));
    schedules
}

/// Narrows `schedules` to what `actor` may see.
///
/// Admins and teachers see the list as is. Students see only sessions of
/// classes they are enrolled in; if the enrollment lookup fails, `policy`
/// decides between the unfiltered list and nothing.
pub async fn filter_for_actor(
    api: &dyn ScheduleApi,
    schedules: Vec<CanonicalSchedule>,
    actor: &Actor,
    policy: EnrollmentFailurePolicy,
    correlation_id: &str,
) -> Vec<CanonicalSchedule> {
    if actor.role != Role::Student {
        return schedules;
    }

    let enrolled = match api.student_classes().await {
        Ok(value) => enrolled_class_ids(&value),
        Err(e) => Err(e),
    };

    match enrolled {
        Ok(enrolled) => {
            let before = schedules.len();
            let visible = retain_enrolled(schedules, &enrolled);
            debug!(
                correlation_id = %correlation_id,
                enrolled = enrolled.len(),
                before = before,
                after = visible.len(),
                "Applied enrollment filter"
            );
            visible
        }
        Err(e) => match policy {
            EnrollmentFailurePolicy::ShowUnfiltered => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Enrollment lookup failed, showing unfiltered schedules"
                );
                schedules
            }
            EnrollmentFailurePolicy::ShowNothing => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %e,
                    "Enrollment lookup failed, hiding schedules"
                );
                Vec::new()
            }
        },
    }
}

/// Parses a class list. Accepts a bare array or an object with a `classes`
/// array; entries that are not classes are skipped.
pub fn parse_classes(value: &Value) -> Vec<ClassInfo> {
    let items: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("classes") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(class) => Some(class),
            Err(e) => {
                debug!(error = %e, "Skipping malformed class entry");
                None
            }
        })
        .collect()
}

/// Classes the actor may attach schedules to: every class for admins, the
/// teacher's own classes for teachers, none for students.
pub async fn classes_for_actor(
    api: &dyn ScheduleApi,
    actor: &Actor,
) -> Result<Vec<ClassInfo>, ScheduleError> {
    let classes = match actor.role {
        Role::Admin => parse_classes(&api.all_classes().await?),
        Role::Teacher => parse_classes(&api.teacher_classes().await?),
        Role::Student => Vec::new(),
    };
    info!(role = %actor.role, count = classes.len(), "Loaded class catalog");
    Ok(classes)
}

/// Case-insensitive substring search over class name, room number, and
/// teacher name. The query is used as typed, whitespace included; an empty
/// query matches everything.
pub fn search<'a>(schedules: &'a [CanonicalSchedule], query: &str) -> Vec<&'a CanonicalSchedule> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return schedules.iter().collect();
    }
    schedules
        .iter()
        .filter(|s| {
            [&s.class_name, &s.room_number, &s.teacher_name]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::mock::MockApi;
    use crate::schedule::types::{RoomStatus, ScheduleId, ScheduleTime};
    use chrono::DateTime;
    use serde_json::json;

    fn schedule(class_id: i64, class_name: &str, room: &str, teacher: &str) -> CanonicalSchedule {
        let at = DateTime::parse_from_rfc3339("2024-01-01T09:00:00Z").unwrap();
        CanonicalSchedule {
            id: ScheduleId::Server(class_id.to_string()),
            class_id,
            class_name: class_name.into(),
            class_code: "X".into(),
            teacher_name: teacher.into(),
            room_number: room.into(),
            start_time: ScheduleTime::At(at),
            end_time: ScheduleTime::At(at),
            status: RoomStatus::Occupied,
        }
    }

    fn sample() -> Vec<CanonicalSchedule> {
        vec![
            schedule(5, "Physics", "P1", "Newton"),
            schedule(7, "Chemistry", "C2", "Curie"),
            schedule(9, "History", "H3", "Herodotus"),
            schedule(12, "Biology", "Lab B", "Darwin"),
        ]
    }

    fn actor(role: Role) -> Actor {
        Actor {
            id: 3,
            username: "pat".into(),
            role,
            first_name: None,
            last_name: None,
        }
    }

    fn class_ids(list: &[CanonicalSchedule]) -> Vec<i64> {
        list.iter().map(|s| s.class_id).collect()
    }

    #[tokio::test]
    async fn test_student_sees_only_enrolled() {
        let api = MockApi::new().student_classes(Ok(json!([
            {"id": 7, "name": "Chemistry", "code": "CHM"},
            {"id": 12, "name": "Biology", "code": "BIO"}
        ])));
        let visible = filter_for_actor(
            &api,
            sample(),
            &actor(Role::Student),
            EnrollmentFailurePolicy::ShowUnfiltered,
            "t",
        )
        .await;

        assert_eq!(class_ids(&visible), vec![7, 12]);
    }

    #[tokio::test]
    async fn test_staff_are_not_filtered() {
        let api = MockApi::new();
        for role in [Role::Admin, Role::Teacher] {
            let visible = filter_for_actor(
                &api,
                sample(),
                &actor(role),
                EnrollmentFailurePolicy::ShowNothing,
                "t",
            )
            .await;
            assert_eq!(visible.len(), 4);
        }
        assert_eq!(api.calls("student_classes"), 0);
    }

    #[tokio::test]
    async fn test_enrollment_failure_policies() {
        let api = MockApi::new().student_classes(Err(MockApi::down()));
        let student = actor(Role::Student);

        let permissive = filter_for_actor(
            &api,
            sample(),
            &student,
            EnrollmentFailurePolicy::ShowUnfiltered,
            "t",
        )
        .await;
        assert_eq!(permissive.len(), 4);

        let strict = filter_for_actor(
            &api,
            sample(),
            &student,
            EnrollmentFailurePolicy::ShowNothing,
            "t",
        )
        .await;
        assert!(strict.is_empty());
    }

    #[test]
    fn test_enrolled_ids_accept_string_ids() {
        let ids = enrolled_class_ids(&json!([{"id": "4"}, {"class_id": 8}, {"name": "x"}])).unwrap();
        assert_eq!(ids, HashSet::from([4, 8]));

        let ids = enrolled_class_ids(&json!([
            {"id": null, "class_id": 7},
            {"id": "n/a", "class_id": "12"},
            {"id": {"nested": 1}}
        ]))
        .unwrap();
        assert_eq!(ids, HashSet::from([7, 12]));
        assert!(enrolled_class_ids(&json!({"classes": []})).is_err());
    }

    #[test]
    fn test_search_matches_any_field() {
        let list = sample();
        assert_eq!(search(&list, "").len(), 4);

        let by_teacher = search(&list, "CURIE");
        assert_eq!(by_teacher.len(), 1);
        assert_eq!(by_teacher[0].class_id, 7);

        let by_room = search(&list, "lab");
        assert_eq!(by_room.len(), 1);
        assert_eq!(by_room[0].class_id, 12);

        // whitespace is part of the needle
        assert!(search(&list, " lab").is_empty());
        assert_eq!(search(&list, "lab b").len(), 1);
        assert!(search(&list, "  ").is_empty());

        // "h" hits Physics, Chemistry, History
        assert_eq!(search(&list, "h").len(), 3);
        assert!(search(&list, "zoology").is_empty());
    }

    #[test]
    fn test_parse_classes_shapes() {
        let wrapped = json!({
            "classes": [
                {"id": 1, "name": "Chem", "code": "CHM", "teacher_id": 2, "student_count": 30},
                {"id": "bad"}
            ],
            "metrics": {"total_classes": 1}
        });
        let classes = parse_classes(&wrapped);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].teacher_id, Some(2));

        let bare = json!([{"id": 3, "name": "Art", "code": "ART"}]);
        assert_eq!(parse_classes(&bare)[0].code, "ART");
        assert!(parse_classes(&json!("nope")).is_empty());
    }

    #[tokio::test]
    async fn test_class_catalog_by_role() {
        let api = MockApi::new()
            .all_classes(Ok(json!([
                {"id": 1, "name": "A", "code": "AAA"},
                {"id": 2, "name": "B", "code": "BBB"}
            ])))
            .teacher_classes(Ok(json!({"classes": [{"id": 2, "name": "B", "code": "BBB"}]})));

        assert_eq!(classes_for_actor(&api, &actor(Role::Admin)).await.unwrap().len(), 2);
        assert_eq!(classes_for_actor(&api, &actor(Role::Teacher)).await.unwrap().len(), 1);
        assert!(classes_for_actor(&api, &actor(Role::Student)).await.unwrap().is_empty());
    }
}
