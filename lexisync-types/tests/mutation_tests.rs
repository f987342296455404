use lexisync_types::{
    DataPayload, DataType, ExperienceState, MutationRecord, Operation, Priority, UserId,
};

fn experience_mutation(xp: u64) -> MutationRecord {
    MutationRecord::new(
        DataType::Experience,
        Operation::Update,
        DataPayload::Experience(ExperienceState {
            experience: xp,
            ..Default::default()
        }),
        UserId::new(),
        Priority::High,
    )
}

#[test]
fn new_mutation_gets_unique_id_and_timestamp() {
    let a = experience_mutation(10);
    let b = experience_mutation(10);
    assert_ne!(a.id, b.id);
    assert!(a.timestamp.as_millis() > 0);
}

#[test]
fn priority_orders_low_to_critical() {
    assert!(Priority::Low < Priority::Normal);
    assert!(Priority::Normal < Priority::High);
    assert!(Priority::High < Priority::Critical);
    assert_eq!(Priority::default(), Priority::Normal);
}

#[test]
fn mutation_round_trips_through_json() {
    // The queue is persisted through the key-value store as JSON; a
    // mutation must survive a restart intact.
    let m = experience_mutation(42);
    let json = serde_json::to_string(&m).unwrap();
    let back: MutationRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, m);
}

#[test]
fn operation_display_is_lowercase() {
    assert_eq!(Operation::Create.to_string(), "create");
    assert_eq!(Operation::Update.to_string(), "update");
    assert_eq!(Operation::Delete.to_string(), "delete");
}
