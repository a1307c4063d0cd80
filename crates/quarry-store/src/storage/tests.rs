use std::sync::Arc;

use crate::config::StoreConfig;
use crate::data::{EntityType, GraphEntity, Query, Row, StoreError, Value, FQN_PROPERTY};
use crate::storage::memory::{MemoryEngineFactory, COUNT_NODES};
use crate::storage::GraphStore;
use crate::traits::Store;

fn types() -> Vec<EntityType> {
    vec![
        EntityType::new("Artifact"),
        EntityType::named("Type"),
        EntityType::named("Class").with_label("Type"),
        EntityType::new("File"),
    ]
}

fn started_store(config: StoreConfig) -> (Arc<MemoryEngineFactory>, GraphStore) {
    let factory = Arc::new(MemoryEngineFactory::new());
    let store = GraphStore::new(factory.clone(), config);
    store.start(&types()).unwrap();
    (factory, store)
}

fn count_nodes(store: &GraphStore) -> i64 {
    store
        .execute_query(&Query::new(COUNT_NODES), &Default::default())
        .unwrap()
        .single()
        .unwrap()
        .map(|row: Row| row.get_i64("count").unwrap())
        .unwrap_or_default()
}

#[test]
fn test_operations_before_start_fail() {
    let store = GraphStore::new(Arc::new(MemoryEngineFactory::new()), StoreConfig::default());
    assert!(matches!(store.create(&EntityType::new("Artifact")), Err(StoreError::NotStarted)));
    assert!(matches!(store.begin_transaction(), Err(StoreError::NotStarted)));
    assert!(matches!(store.reset(), Err(StoreError::NotStarted)));
    assert!(!store.has_active_transaction());
}

#[test]
fn test_start_twice_is_rejected() {
    let (_, store) = started_store(StoreConfig::default());
    assert!(matches!(store.start(&types()), Err(StoreError::AlreadyStarted)));
}

#[test]
fn test_stop_is_idempotent() {
    let store = GraphStore::new(Arc::new(MemoryEngineFactory::new()), StoreConfig::default());
    store.stop().unwrap();
    store.start(&types()).unwrap();
    store.stop().unwrap();
    store.stop().unwrap();
    assert!(!store.is_started());
}

#[test]
fn test_create_named_sets_fqn_and_caches() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");

    store.begin_transaction().unwrap();
    let entity = store.create_named(&type_, "com.acme.Foo").unwrap();
    store.commit_transaction().unwrap();

    assert_eq!(entity.full_qualified_name(), Some("com.acme.Foo"));
    assert_eq!(store.property(&entity, FQN_PROPERTY).unwrap(), Some(Value::from("com.acme.Foo")));
    assert_eq!(store.cached("com.acme.Foo"), Some(entity));
}

#[test]
fn test_create_named_validates_type_and_key() {
    let (_, store) = started_store(StoreConfig::default());
    store.begin_transaction().unwrap();
    let err = store.create_named(&EntityType::new("Artifact"), "a").unwrap_err();
    assert!(matches!(err, StoreError::NotNamed(name) if name == "Artifact"));
    let err = store.create_named(&EntityType::named("Type"), "").unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)));
}

#[test]
fn test_create_outside_transaction_is_rejected_by_engine() {
    let (_, store) = started_store(StoreConfig::default());
    let err = store.create(&EntityType::new("Artifact")).unwrap_err();
    assert!(err.is_transaction_error());
}

#[test]
fn test_duplicate_key_last_write_wins() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");
    store.begin_transaction().unwrap();
    let first = store.create_named(&type_, "com.acme.Foo").unwrap();
    let second = store.create_named(&type_, "com.acme.Foo").unwrap();
    store.commit_transaction().unwrap();

    assert!(!first.same_identity(&second));
    let found = store.find(&type_, "com.acme.Foo").unwrap().unwrap();
    assert!(found.same_identity(&second));
    assert_eq!(count_nodes(&store), 2);
}

#[test]
fn test_migrate_keeps_identity_and_recaches() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");
    let class = EntityType::named("Class").with_label("Type");

    store.begin_transaction().unwrap();
    let entity = store.create_named(&type_, "com.acme.Foo").unwrap();
    let migrated = store.migrate(&entity, &class).unwrap();
    store.commit_transaction().unwrap();

    assert!(migrated.same_identity(&entity));
    assert_eq!(migrated.entity_type(), &class);
    assert_eq!(store.cached("com.acme.Foo"), Some(migrated));
}

#[test]
fn test_migrate_unnamed_entity_reads_fqn_property() {
    let (_, store) = started_store(StoreConfig::default());
    let file = EntityType::new("File");
    let type_ = EntityType::named("Type");

    store.begin_transaction().unwrap();
    let entity = store.create(&file).unwrap();
    store.set_property(&entity, FQN_PROPERTY, Value::from("com.acme.Bar")).unwrap();
    let migrated = store.migrate(&entity, &type_).unwrap();
    store.commit_transaction().unwrap();

    assert_eq!(migrated.full_qualified_name(), Some("com.acme.Bar"));
    assert!(store.cached("com.acme.Bar").is_some());
}

#[test]
fn test_migrate_to_unnamed_type_drops_cache_entry() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");
    let file = EntityType::new("File");

    store.begin_transaction().unwrap();
    let entity = store.create_named(&type_, "com.acme.Foo").unwrap();
    let migrated = store.migrate(&entity, &file).unwrap();
    store.commit_transaction().unwrap();

    assert!(!migrated.is_named());
    assert!(store.cached("com.acme.Foo").is_none());
}

#[test]
fn test_failed_migration_propagates() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");
    store.begin_transaction().unwrap();
    let entity = store.create_named(&type_, "com.acme.Foo").unwrap();
    let err = store.migrate(&entity, &EntityType::named("Unknown")).unwrap_err();
    assert!(matches!(err, StoreError::UnknownType(_)));
}

#[test]
fn test_find_engine_hit_is_not_cached() {
    let factory = Arc::new(MemoryEngineFactory::new());
    let type_ = EntityType::named("Type");
    {
        let store = GraphStore::new(factory.clone(), StoreConfig::default());
        store.start(&types()).unwrap();
        store.begin_transaction().unwrap();
        store.create_named(&type_, "com.acme.Foo").unwrap();
        store.commit_transaction().unwrap();
        store.stop().unwrap();
    }

    let store = GraphStore::new(factory, StoreConfig::default());
    store.start(&types()).unwrap();
    let found = store.find(&type_, "com.acme.Foo").unwrap();
    assert!(found.is_some());
    assert_eq!(store.cache_len(), 0);
    assert!(store.find(&type_, "com.acme.Missing").unwrap().is_none());
}

#[test]
fn test_rollback_forgets_created_keys() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");

    store.begin_transaction().unwrap();
    store.create_named(&type_, "com.acme.Kept").unwrap();
    store.commit_transaction().unwrap();

    store.begin_transaction().unwrap();
    store.create_named(&type_, "com.acme.Dropped").unwrap();
    store.rollback_transaction().unwrap();

    assert!(store.cached("com.acme.Kept").is_some());
    assert!(store.cached("com.acme.Dropped").is_none());
    assert!(store.find(&type_, "com.acme.Dropped").unwrap().is_none());
    assert_eq!(count_nodes(&store), 1);
}

fn tracked_for_rollback(store: &GraphStore) -> usize {
    store.session.lock().as_ref().map_or(0, |session| session.created.len())
}

#[test]
fn test_rollback_tracking_is_bounded_by_cache_capacity() {
    let (_, store) = started_store(StoreConfig::default().with_cache_capacity(4));
    let type_ = EntityType::named("Type");

    store.begin_transaction().unwrap();
    for i in 0..1_000 {
        store.create_named(&type_, &format!("com.acme.T{}", i)).unwrap();
        assert!(tracked_for_rollback(&store) <= 4);
    }
    assert_eq!(store.cache_len(), 4);
    assert_eq!(tracked_for_rollback(&store), 4);
    store.rollback_transaction().unwrap();

    assert_eq!(store.cache_len(), 0);
    assert_eq!(tracked_for_rollback(&store), 0);
    assert_eq!(count_nodes(&store), 0);
}

#[test]
fn test_migrate_to_unnamed_type_stops_rollback_tracking() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");

    store.begin_transaction().unwrap();
    let entity = store.create_named(&type_, "com.acme.Foo").unwrap();
    assert_eq!(tracked_for_rollback(&store), 1);
    store.migrate(&entity, &EntityType::new("File")).unwrap();
    assert_eq!(tracked_for_rollback(&store), 0);
    store.rollback_transaction().unwrap();
    assert_eq!(count_nodes(&store), 0);
}

#[test]
fn test_rollback_keeps_migrate_cache_effects() {
    let (_, store) = started_store(StoreConfig::default());
    let type_ = EntityType::named("Type");
    let class = EntityType::named("Class").with_label("Type");

    store.begin_transaction().unwrap();
    let entity = store.create_named(&type_, "com.acme.Foo").unwrap();
    store.commit_transaction().unwrap();

    store.begin_transaction().unwrap();
    store.migrate(&entity, &class).unwrap();
    store.rollback_transaction().unwrap();

    // the node is back to Type but the cache still holds the Class handle
    let cached: GraphEntity = store.cached("com.acme.Foo").unwrap();
    assert_eq!(cached.entity_type(), &class);
}

#[test]
fn test_reset_deletes_everything_in_batches() {
    let (factory, store) = started_store(StoreConfig::default().with_batch_sizes(2, 3));
    let artifact = EntityType::new("Artifact");
    let type_ = EntityType::named("Type");

    store.begin_transaction().unwrap();
    let root = store.create_named(&type_, "com.acme.Root").unwrap();
    for _ in 0..6 {
        let child = store.create(&artifact).unwrap();
        store.relate(&root, "CONTAINS", &child).unwrap();
    }
    store.commit_transaction().unwrap();

    let summary = store.reset().unwrap();

    assert_eq!(summary.relationships_deleted, 6);
    assert_eq!(summary.nodes_deleted, 7);
    // 3 + 1 relationship batches, 3 + 1 node batches
    assert_eq!(summary.batches, 8);
    assert_eq!(factory.graph().node_count(), 0);
    assert_eq!(store.cache_len(), 0);
    assert!(!store.has_active_transaction());
}

#[test]
fn test_reset_on_empty_graph() {
    let (_, store) = started_store(StoreConfig::default());
    let summary = store.reset().unwrap();
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.nodes_deleted, 0);
}

#[test]
fn test_reset_with_open_transaction_fails() {
    let (_, store) = started_store(StoreConfig::default());
    store.begin_transaction().unwrap();
    assert!(store.reset().unwrap_err().is_transaction_error());
    assert!(store.has_active_transaction());
}
