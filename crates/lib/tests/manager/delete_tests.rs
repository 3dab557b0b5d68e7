use shelf_lib::store::memory::MemoryStore;
use shelf_lib::{ObjectManager, Outcome};

use super::common::{Fixture, meta, owners, p};

fn shared_store(wire: &str) -> MemoryStore {
  let store = MemoryStore::new();
  store.insert("org/a.jar", "body", meta(&[("checksum", "d1"), ("rh-products", wire)]));
  store
}

#[tokio::test]
async fn release_down_to_zero_deletes() {
  let fx = Fixture::new();
  let jar = fx.path("org/a.jar");
  let manager = ObjectManager::new(shared_store("A,B"));

  let first = manager.delete_files(&[jar.clone()], Some(&p("A")), &fx.root()).await;
  assert_eq!(first.outcome_of("org/a.jar"), Some(Outcome::Released));
  assert_eq!(owners(manager.store(), "org/a.jar"), vec!["B"]);
  assert_eq!(manager.store().body("org/a.jar").unwrap().as_ref(), b"body");

  let second = manager.delete_files(&[jar], Some(&p("B")), &fx.root()).await;
  assert_eq!(second.outcome_of("org/a.jar"), Some(Outcome::Deleted));
  assert!(!manager.store().contains("org/a.jar"));
}

#[tokio::test]
async fn release_by_non_owner_changes_nothing() {
  let fx = Fixture::new();
  let manager = ObjectManager::new(shared_store("A"));

  let report = manager
    .delete_files(&[fx.path("org/a.jar")], Some(&p("C")), &fx.root())
    .await;

  assert_eq!(report.outcome_of("org/a.jar"), Some(Outcome::Unchanged));
  assert_eq!(owners(manager.store(), "org/a.jar"), vec!["A"]);
  assert_eq!(manager.store().ops().writes(), 0);
}

#[tokio::test]
async fn absent_object_is_not_an_error() {
  let fx = Fixture::new();
  let manager = ObjectManager::new(MemoryStore::new());

  let report = manager
    .delete_files(&[fx.path("org/gone.jar")], Some(&p("A")), &fx.root())
    .await;

  assert!(report.is_success());
  assert_eq!(report.outcome_of("org/gone.jar"), Some(Outcome::Absent));
}

#[tokio::test]
async fn object_without_owners_is_never_deleted() {
  let fx = Fixture::new();
  let store = MemoryStore::new();
  store.insert("org/a.jar", "body", meta(&[("checksum", "d1")]));
  let manager = ObjectManager::new(store);

  let with_product = manager
    .delete_files(&[fx.path("org/a.jar")], Some(&p("A")), &fx.root())
    .await;
  let without_product = manager.delete_files(&[fx.path("org/a.jar")], None, &fx.root()).await;

  assert_eq!(with_product.outcome_of("org/a.jar"), Some(Outcome::Unchanged));
  assert_eq!(without_product.outcome_of("org/a.jar"), Some(Outcome::Unchanged));
  assert!(manager.store().contains("org/a.jar"));
}

#[tokio::test]
async fn release_preserves_unknown_metadata() {
  let fx = Fixture::new();
  let store = MemoryStore::new();
  store.insert(
    "org/a.jar",
    "body",
    meta(&[("checksum", "d1"), ("rh-products", "A,B"), ("build-id", "7")]),
  );
  let manager = ObjectManager::new(store);

  manager
    .delete_files(&[fx.path("org/a.jar")], Some(&p("B")), &fx.root())
    .await;

  assert_eq!(
    manager.store().metadata("org/a.jar").unwrap(),
    meta(&[("checksum", "d1"), ("rh-products", "A"), ("build-id", "7")])
  );
}

#[tokio::test]
async fn paths_outside_root_are_used_verbatim() {
  let store = MemoryStore::new();
  store.insert("/elsewhere/a.jar", "body", meta(&[("rh-products", "A")]));
  let manager = ObjectManager::new(store);

  let report = manager
    .delete_files(&["/elsewhere/a.jar".into()], Some(&p("A")), "/tmp/repo")
    .await;

  assert_eq!(report.outcome_of("/elsewhere/a.jar"), Some(Outcome::Deleted));
  assert!(manager.store().is_empty());
}
