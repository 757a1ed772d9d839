//! Task manager against the in-memory store

mod common;

use common::*;
use gym_cloud::db::TaskFilter;
use gym_cloud::retention::tasks::{MAX_BULK_TASKS, bulk_update, create_task, list_tasks, update_task};
use shared::error::ErrorCode;
use shared::models::{
    RetentionTaskBulkUpdate, RetentionTaskCreate, RetentionTaskUpdate, Role, TaskStatus,
};
use shared::response::PageRequest;

fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_member(TENANT, 1, "Ana");
    store.add_member(TENANT, 2, "Ben");
    store.add_member(OTHER_TENANT, 3, "Cam");
    store.add_staff(TENANT, 10, true);
    store.add_staff(TENANT, 11, false);
    store.add_staff(OTHER_TENANT, 12, true);
    store
}

fn create(member_id: i64) -> RetentionTaskCreate {
    RetentionTaskCreate {
        member_id,
        title: "  Call about renewal ".into(),
        note: None,
        priority: None,
        due_date: None,
        assigned_to_id: None,
    }
}

fn set_status(status: &str) -> RetentionTaskUpdate {
    RetentionTaskUpdate {
        status: Some(status.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_list_orders_by_priority_then_due_date() {
    let store = seeded();
    store.add_task(TENANT, staff_task(1, 1, 2, None));
    store.add_task(TENANT, staff_task(2, 1, 1, Some(days_from_now(5))));
    store.add_task(TENANT, staff_task(3, 2, 2, Some(days_from_now(1))));
    store.add_task(TENANT, staff_task(4, 2, 1, Some(days_from_now(2))));
    store.add_task(TENANT, staff_task(5, 2, 3, Some(days_from_now(1))));
    store.add_task(OTHER_TENANT, staff_task(6, 3, 1, None));

    let page = list_tasks(&store, &caller(Role::Staff), &TaskFilter::default(), PageRequest::default())
        .await
        .unwrap();
    let ids: Vec<i64> = page.items.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![4, 2, 3, 1, 5]);
    assert_eq!(page.total, 5);
}

#[tokio::test]
async fn test_list_filters_and_pages() {
    let store = seeded();
    for id in 1..=5 {
        let mut task = staff_task(id, if id % 2 == 0 { 2 } else { 1 }, 2, None);
        if id == 3 {
            task.status = TaskStatus::Done;
            task.assigned_to_id = Some(10);
        }
        store.add_task(TENANT, task);
    }

    let staff = caller(Role::Staff);
    let by_member = TaskFilter {
        member_id: Some(1),
        ..Default::default()
    };
    let page = list_tasks(&store, &staff, &by_member, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 3);

    let open = TaskFilter {
        status: Some(TaskStatus::Open),
        ..Default::default()
    };
    let page = list_tasks(&store, &staff, &open, PageRequest::new(Some(2), Some(3)))
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_pages, 2);

    let assigned = TaskFilter {
        assigned_to_id: Some(10),
        ..Default::default()
    };
    let page = list_tasks(&store, &staff, &assigned, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.items.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3]);
}

#[tokio::test]
async fn test_members_cannot_list_tasks() {
    let store = seeded();
    let err = list_tasks(&store, &member_caller(1), &TaskFilter::default(), PageRequest::default())
        .await
        .unwrap_err();
    assert_eq!(error_code(err), ErrorCode::PermissionDenied);
}

#[tokio::test]
async fn test_create_defaults() {
    let store = seeded();
    let staff = caller(Role::Staff);

    let task = create_task(&store, &staff, &create(1), NOW).await.unwrap();
    assert_eq!(task.title, "Call about renewal");
    assert_eq!(task.priority, 2);
    assert_eq!(task.status, TaskStatus::Open);
    assert_eq!(task.created_by_id, Some(staff.user_id));
    assert_eq!(task.created_at, NOW);
    assert!(task.resolved_at.is_none());
    assert_eq!(store.task(task.id).unwrap(), task);
}

#[tokio::test]
async fn test_create_validates_member_and_assignee() {
    let store = seeded();
    let staff = caller(Role::Staff);

    let err = create_task(&store, &staff, &create(99), NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::MemberNotFound);

    // Member of another gym
    let err = create_task(&store, &staff, &create(3), NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::MemberNotFound);

    for staff_id in [11, 12, 404] {
        let payload = RetentionTaskCreate {
            assigned_to_id: Some(staff_id),
            ..create(1)
        };
        let err = create_task(&store, &staff, &payload, NOW).await.unwrap_err();
        assert_eq!(error_code(err), ErrorCode::StaffNotFound, "staff {staff_id}");
    }

    let payload = RetentionTaskCreate {
        assigned_to_id: Some(10),
        ..create(1)
    };
    let task = create_task(&store, &staff, &payload, NOW).await.unwrap();
    assert_eq!(task.assigned_to_id, Some(10));
}

#[tokio::test]
async fn test_create_rejects_bad_fields() {
    let store = seeded();
    let staff = caller(Role::Admin);

    let blank = RetentionTaskCreate {
        title: "   ".into(),
        ..create(1)
    };
    let err = create_task(&store, &staff, &blank, NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::RequiredField);

    let urgent = RetentionTaskCreate {
        priority: Some(0),
        ..create(1)
    };
    let err = create_task(&store, &staff, &urgent, NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::RetentionTaskInvalidPriority);

    assert!(store.tasks_for(1).is_empty());
}

#[tokio::test]
async fn test_update_stamps_and_clears_resolved_at() {
    let store = seeded();
    store.add_task(TENANT, staff_task(1, 1, 2, None));
    let staff = caller(Role::Staff);

    let done = update_task(&store, &staff, 1, &set_status("DONE"), NOW).await.unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(done.resolved_at, Some(NOW));

    // Already terminal: keep the original stamp
    let dismissed = update_task(&store, &staff, 1, &set_status("DISMISSED"), NOW + 5)
        .await
        .unwrap();
    assert_eq!(dismissed.resolved_at, Some(NOW));

    let reopened = update_task(&store, &staff, 1, &set_status("IN_PROGRESS"), NOW + 9)
        .await
        .unwrap();
    assert_eq!(reopened.resolved_at, None);
    assert_eq!(reopened.updated_at, NOW + 9);
    assert_eq!(store.task(1).unwrap(), reopened);
}

#[tokio::test]
async fn test_update_fields_and_note_clearing() {
    let store = seeded();
    let mut task = staff_task(1, 1, 2, None);
    task.note = Some("left voicemail".into());
    store.add_task(TENANT, task);
    let staff = caller(Role::Staff);

    let update = RetentionTaskUpdate {
        priority: Some(1),
        assigned_to_id: Some(Some(10)),
        due_date: Some(Some(days_from_now(1))),
        note: Some("".into()),
        ..Default::default()
    };
    let updated = update_task(&store, &staff, 1, &update, NOW).await.unwrap();
    assert_eq!(updated.priority, 1);
    assert_eq!(updated.assigned_to_id, Some(10));
    assert_eq!(updated.due_date, Some(days_from_now(1)));
    assert_eq!(updated.note, None);
    assert_eq!(updated.status, TaskStatus::Open);
}

#[tokio::test]
async fn test_update_errors() {
    let store = seeded();
    store.add_task(TENANT, staff_task(1, 1, 2, None));
    store.add_task(OTHER_TENANT, staff_task(2, 3, 2, None));
    let staff = caller(Role::Staff);

    let err = update_task(&store, &staff, 99, &set_status("DONE"), NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::RetentionTaskNotFound);

    let err = update_task(&store, &staff, 2, &set_status("DONE"), NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::RetentionTaskNotFound);
    assert_eq!(store.task(2).unwrap().status, TaskStatus::Open);

    let err = update_task(&store, &staff, 1, &set_status("CLOSED"), NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::RetentionTaskInvalidStatus);

    let err = update_task(&store, &staff, 1, &RetentionTaskUpdate::default(), NOW)
        .await
        .unwrap_err();
    assert_eq!(error_code(err), ErrorCode::RetentionTaskEmptyUpdate);

    let reassign = RetentionTaskUpdate {
        assigned_to_id: Some(Some(11)),
        ..Default::default()
    };
    let err = update_task(&store, &staff, 1, &reassign, NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::StaffNotFound);
    assert_eq!(store.task(1).unwrap().assigned_to_id, None);
}

#[tokio::test]
async fn test_update_null_unassigns_and_clears_due_date() {
    let store = seeded();
    let mut task = staff_task(1, 1, 2, Some(days_from_now(2)));
    task.assigned_to_id = Some(10);
    store.add_task(TENANT, task);
    let staff = caller(Role::Staff);

    // Arrives as {"assignedToId": null, "dueDate": null}
    let update: RetentionTaskUpdate =
        serde_json::from_value(serde_json::json!({ "assignedToId": null, "dueDate": null }))
            .unwrap();
    let updated = update_task(&store, &staff, 1, &update, NOW).await.unwrap();
    assert_eq!(updated.assigned_to_id, None);
    assert_eq!(updated.due_date, None);
    assert_eq!(store.task(1).unwrap(), updated);

    // Absent keys leave the fields alone
    let mut assigned = updated.clone();
    assigned.assigned_to_id = Some(10);
    store.replace_task(assigned);
    let updated = update_task(&store, &staff, 1, &set_status("IN_PROGRESS"), NOW)
        .await
        .unwrap();
    assert_eq!(updated.assigned_to_id, Some(10));
}

#[tokio::test]
async fn test_bulk_partial_success() {
    let store = seeded();
    store.add_task(TENANT, staff_task(1, 1, 2, None));
    store.add_task(TENANT, staff_task(2, 2, 2, None));
    store.add_task(OTHER_TENANT, staff_task(3, 3, 2, None));

    let bulk = RetentionTaskBulkUpdate {
        task_ids: vec![1, 2, 2, 3, 77],
        update: set_status("DONE"),
    };
    let result = bulk_update(&store, &caller(Role::Staff), &bulk, NOW).await.unwrap();
    assert_eq!(result.updated, 2);
    assert_eq!(result.not_found, vec![3, 77]);
    assert_eq!(result.tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);

    for id in [1, 2] {
        let task = store.task(id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.resolved_at, Some(NOW));
    }
    assert_eq!(store.task(3).unwrap().status, TaskStatus::Open);
}

#[tokio::test]
async fn test_bulk_with_no_existing_ids_succeeds() {
    let store = seeded();
    let bulk = RetentionTaskBulkUpdate {
        task_ids: vec![500, 501],
        update: set_status("DISMISSED"),
    };
    let result = bulk_update(&store, &caller(Role::Admin), &bulk, NOW).await.unwrap();
    assert_eq!(result.updated, 0);
    assert_eq!(result.not_found, vec![500, 501]);
    assert!(result.tasks.is_empty());
}

#[tokio::test]
async fn test_bulk_limits() {
    let store = seeded();
    let staff = caller(Role::Staff);

    let empty = RetentionTaskBulkUpdate {
        task_ids: vec![],
        update: set_status("DONE"),
    };
    let err = bulk_update(&store, &staff, &empty, NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::BulkUpdateEmpty);

    let too_many = RetentionTaskBulkUpdate {
        task_ids: (1..=MAX_BULK_TASKS as i64 + 1).collect(),
        update: set_status("DONE"),
    };
    let err = bulk_update(&store, &staff, &too_many, NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::BulkUpdateTooLarge);
}

#[tokio::test]
async fn test_bulk_invalid_patch_writes_nothing() {
    let store = seeded();
    store.add_task(TENANT, staff_task(1, 1, 2, None));
    let bulk = RetentionTaskBulkUpdate {
        task_ids: vec![1],
        update: RetentionTaskUpdate {
            status: Some("DONE".into()),
            priority: Some(9),
            ..Default::default()
        },
    };
    let err = bulk_update(&store, &caller(Role::Staff), &bulk, NOW).await.unwrap_err();
    assert_eq!(error_code(err), ErrorCode::RetentionTaskInvalidPriority);
    assert_eq!(store.task(1).unwrap().status, TaskStatus::Open);
}
