use shelf_lib::store::memory::MemoryStore;
use shelf_lib::{FailureKind, ObjectManager, Outcome};

use super::common::{Fault, FaultyStore, Fixture, meta, p};

fn three_files(fx: &Fixture) -> Vec<std::path::PathBuf> {
  vec![fx.write("a.txt", "a"), fx.write("b.txt", "b"), fx.write("c.txt", "c")]
}

#[tokio::test]
async fn store_error_fails_only_that_item() {
  let fx = Fixture::new();
  let paths = three_files(&fx);
  let manager = ObjectManager::new(FaultyStore::new(MemoryStore::new(), "b.txt", Fault::Error));

  let report = manager.upload_files(&paths, Some(&p("P")), &fx.root()).await;

  assert_eq!(report.succeeded.len(), 2);
  assert_eq!(report.outcome_of("a.txt"), Some(Outcome::Created));
  assert_eq!(report.outcome_of("c.txt"), Some(Outcome::Created));

  let failure = report.failure_of("b.txt").unwrap();
  assert_eq!(failure.kind, FailureKind::StoreUnavailable);
  assert_eq!(failure.key, "b.txt");
  assert_eq!(failure.product.as_ref().map(|p| p.as_str()), Some("P"));
  assert!(failure.message.contains("connection reset"));
  assert!(!manager.store().inner.contains("b.txt"));
}

#[tokio::test]
async fn store_error_during_release_keeps_other_releases() {
  let fx = Fixture::new();
  let store = MemoryStore::new();
  for key in ["a.txt", "b.txt"] {
    store.insert(key, "x", meta(&[("rh-products", "P")]));
  }
  let manager = ObjectManager::new(FaultyStore::new(store, "b.txt", Fault::Error));

  let report = manager
    .delete_files(&[fx.path("a.txt"), fx.path("b.txt")], Some(&p("P")), &fx.root())
    .await;

  assert_eq!(report.outcome_of("a.txt"), Some(Outcome::Deleted));
  assert_eq!(report.failure_of("b.txt").unwrap().kind, FailureKind::StoreUnavailable);
  assert!(manager.store().inner.contains("b.txt"));
}

#[tokio::test]
async fn panicking_item_is_reported_as_aborted() {
  let fx = Fixture::new();
  let paths = three_files(&fx);
  let manager = ObjectManager::new(FaultyStore::new(MemoryStore::new(), "b.txt", Fault::Panic));

  let report = manager.upload_files(&paths, Some(&p("P")), &fx.root()).await;

  assert_eq!(report.total(), 3);
  assert_eq!(report.succeeded.len(), 2);
  let failure = report.failure_of("b.txt").unwrap();
  assert_eq!(failure.kind, FailureKind::Aborted);
  assert_eq!(failure.product.as_ref().map(|p| p.as_str()), Some("P"));
  assert!(failure.message.contains("panic"), "{}", failure.message);
}
