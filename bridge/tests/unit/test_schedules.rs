//! Schedule reconciliation tests

use std::collections::BTreeMap;

use doorbridge::errors::BridgeError;
use doorbridge::models::favorite::FavoriteId;
use doorbridge::models::schedule::{ActionKind, OutputAction, ScheduleEntry};
use doorbridge::models::trigger::TriggerKind;
use doorbridge::sync::schedules::ScheduleReconciler;

use crate::fakes::{bell, is_replace, FakeDevice};

fn owned(pairs: &[(TriggerKind, &str)]) -> BTreeMap<TriggerKind, FavoriteId> {
    pairs
        .iter()
        .map(|(trigger, id)| (trigger.clone(), FavoriteId::from(*id)))
        .collect()
}

fn entry_with(trigger: TriggerKind, actions: Vec<OutputAction>) -> ScheduleEntry {
    let mut entry = ScheduleEntry::empty(trigger);
    entry.actions = actions;
    entry
}

#[tokio::test]
async fn test_hooked_trigger_makes_no_calls() {
    let device = FakeDevice::new().with_schedule(entry_with(
        bell("1"),
        vec![OutputAction::http_hook(&FavoriteId::from("10"))],
    ));
    let entries = tokio_test::assert_ok!(
        doorbridge::http::api::DeviceApi::list_schedule(&device).await
    );

    let outcome = ScheduleReconciler::new(&device, 20)
        .reconcile(&entries, &[bell("1")], &owned(&[(bell("1"), "10")]))
        .await;

    assert_eq!(outcome.hooked, vec![bell("1")]);
    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn test_missing_hook_is_appended_after_existing_actions() {
    let mut existing = OutputAction::http_hook(&FavoriteId::from("2"));
    existing.kind = ActionKind::Other("notify".to_string());
    let device = FakeDevice::new().with_schedule(entry_with(bell("4F3B"), vec![existing.clone()]));
    let entries = vec![device.schedule_for(&bell("4F3B")).unwrap()];

    let outcome = ScheduleReconciler::new(&device, 20)
        .reconcile(&entries, &[bell("4F3B")], &owned(&[(bell("4F3B"), "1")]))
        .await;

    assert_eq!(outcome.appended, vec![bell("4F3B")]);
    assert_eq!(device.count(is_replace), 1);

    let submitted = device.schedule_for(&bell("4F3B")).unwrap();
    assert_eq!(submitted.actions.len(), 2);
    assert_eq!(submitted.actions[0], existing);
    let hook = &submitted.actions[1];
    assert_eq!(hook.kind, ActionKind::Http);
    assert_eq!(hook.param, "1");
    assert!(hook.enabled);
}

#[tokio::test]
async fn test_missing_motion_entry_is_created() {
    let device = FakeDevice::new();

    let outcome = ScheduleReconciler::new(&device, 20)
        .reconcile(
            &[],
            &[TriggerKind::MotionSensor],
            &owned(&[(TriggerKind::MotionSensor, "4")]),
        )
        .await;

    assert_eq!(outcome.appended, vec![TriggerKind::MotionSensor]);
    let entry = device.schedule_for(&TriggerKind::MotionSensor).unwrap();
    assert!(entry.has_hook(&FavoriteId::from("4")));
}

#[tokio::test]
async fn test_full_schedule_reports_capacity() {
    let actions: Vec<OutputAction> = (0..3)
        .map(|i| OutputAction::http_hook(&FavoriteId::from(i.to_string().as_str())))
        .collect();
    let device = FakeDevice::new().with_schedule(entry_with(bell("1"), actions));
    let entries = vec![device.schedule_for(&bell("1")).unwrap()];

    let outcome = ScheduleReconciler::new(&device, 3)
        .reconcile(
            &entries,
            &[bell("1"), TriggerKind::MotionSensor],
            &owned(&[(bell("1"), "9"), (TriggerKind::MotionSensor, "8")]),
        )
        .await;

    assert_eq!(outcome.failed.len(), 1);
    assert!(matches!(
        outcome.failed[0],
        (_, BridgeError::CapacityExceeded { count: 3, limit: 3, .. })
    ));
    // The other trigger is still handled
    assert_eq!(outcome.appended, vec![TriggerKind::MotionSensor]);
    assert_eq!(device.schedule_for(&bell("1")).unwrap().actions.len(), 3);
}

#[tokio::test]
async fn test_trigger_without_favorite_is_skipped() {
    let device = FakeDevice::new().with_doorbell("1");
    let entries = vec![device.schedule_for(&bell("1")).unwrap()];

    let outcome = ScheduleReconciler::new(&device, 20)
        .reconcile(&entries, &[bell("1")], &BTreeMap::new())
        .await;

    assert_eq!(outcome.skipped, vec![bell("1")]);
    assert!(device.calls().is_empty());
}
