use shelf_lib::digest::digest_bytes;
use shelf_lib::store::memory::MemoryStore;
use shelf_lib::{FailureKind, ObjectBody, ObjectManager, Outcome};

use super::common::{Fixture, RecordingStore, digest_of, meta, owners, p};

#[tokio::test]
async fn first_upload_creates_object_with_digest_and_owner() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "jar-v1");
  let manager = ObjectManager::new(MemoryStore::new());

  let report = manager.upload_files(&[jar], Some(&p("eap")), &fx.root()).await;

  assert!(report.is_success());
  assert_eq!(report.outcome_of("org/a.jar"), Some(Outcome::Created));
  let store = manager.store();
  assert_eq!(store.body("org/a.jar").unwrap().as_ref(), b"jar-v1");
  assert_eq!(digest_of(store, "org/a.jar"), Some(digest_bytes(b"jar-v1")));
  assert_eq!(owners(store, "org/a.jar"), vec!["eap"]);
}

#[tokio::test]
async fn repeated_upload_is_idempotent() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "jar-v1");
  let manager = ObjectManager::new(MemoryStore::new());

  manager.upload_files(&[jar.clone()], Some(&p("a")), &fx.root()).await;
  let before = manager.store().ops();

  let report = manager.upload_files(&[jar], Some(&p("a")), &fx.root()).await;

  assert_eq!(report.outcome_of("org/a.jar"), Some(Outcome::Unchanged));
  let after = manager.store().ops();
  assert_eq!(after.writes(), before.writes());
  assert_eq!(after.puts, 1);
  assert_eq!(owners(manager.store(), "org/a.jar"), vec!["a"]);
}

#[tokio::test]
async fn second_product_is_appended_in_order() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "shared");
  let manager = ObjectManager::new(MemoryStore::new());

  manager.upload_files(&[jar.clone()], Some(&p("A")), &fx.root()).await;
  let report = manager.upload_files(&[jar], Some(&p("B")), &fx.root()).await;

  assert_eq!(report.outcome_of("org/a.jar"), Some(Outcome::OwnerAdded));
  assert_eq!(owners(manager.store(), "org/a.jar"), vec!["A", "B"]);
  let ops = manager.store().ops();
  assert_eq!(ops.puts, 1);
  assert_eq!(ops.metadata_updates, 1);
}

#[tokio::test]
async fn different_content_under_same_key_is_rejected() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "first");
  let manager = ObjectManager::new(MemoryStore::new());
  manager.upload_files(&[jar.clone()], Some(&p("P1")), &fx.root()).await;

  std::fs::write(&jar, "second").unwrap();
  let report = manager.upload_files(&[jar], Some(&p("P2")), &fx.root()).await;

  assert!(!report.is_success());
  let failure = report.failure_of("org/a.jar").unwrap();
  assert_eq!(failure.kind, FailureKind::ChecksumConflict);
  assert_eq!(failure.product.as_ref().map(|p| p.as_str()), Some("P2"));
  assert!(failure.message.contains(&digest_bytes(b"first")));
  assert!(failure.message.contains(&digest_bytes(b"second")));

  let store = manager.store();
  assert_eq!(store.body("org/a.jar").unwrap().as_ref(), b"first");
  assert_eq!(owners(store, "org/a.jar"), vec!["P1"]);
}

#[tokio::test]
async fn missing_file_fails_only_that_item() {
  let fx = Fixture::new();
  let a = fx.write("a.txt", "a");
  let missing = fx.path("missing.txt");
  let c = fx.write("c.txt", "c");
  let manager = ObjectManager::new(MemoryStore::new());

  let report = manager.upload_files(&[a, missing, c], Some(&p("x")), &fx.root()).await;

  assert_eq!(report.succeeded.len(), 2);
  assert_eq!(report.failed.len(), 1);
  assert_eq!(report.failed[0].kind, FailureKind::LocalFileMissing);
  assert_eq!(report.failed[0].key, "missing.txt");
  let keys: Vec<_> = report.succeeded.iter().map(|r| r.key.as_str()).collect();
  assert_eq!(keys, vec!["a.txt", "c.txt"]);
  assert_eq!(manager.store().len(), 2);
}

#[tokio::test]
async fn directory_counts_as_missing_file() {
  let fx = Fixture::new();
  std::fs::create_dir_all(fx.path("org")).unwrap();
  let manager = ObjectManager::new(MemoryStore::new());

  let report = manager.upload_files(&[fx.path("org")], Some(&p("x")), &fx.root()).await;

  assert_eq!(report.failed[0].kind, FailureKind::LocalFileMissing);
  assert!(manager.store().is_empty());
}

#[tokio::test]
async fn upload_without_product_records_only_digest() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "anon");
  let manager = ObjectManager::new(MemoryStore::new());

  manager.upload_files(&[jar.clone()], None, &fx.root()).await;
  let report = manager.upload_files(&[jar], None, &fx.root()).await;

  assert_eq!(report.outcome_of("org/a.jar"), Some(Outcome::Unchanged));
  let stored = manager.store().metadata("org/a.jar").unwrap();
  let digest = digest_bytes(b"anon");
  assert_eq!(stored, meta(&[("checksum", digest.as_str())]));
}

#[tokio::test]
async fn object_without_digest_accepts_any_content() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "local");
  let store = MemoryStore::new();
  store.insert("org/a.jar", "legacy", meta(&[("rh-products", "old")]));
  let manager = ObjectManager::new(store);

  let report = manager.upload_files(&[jar], Some(&p("new")), &fx.root()).await;

  assert_eq!(report.outcome_of("org/a.jar"), Some(Outcome::OwnerAdded));
  assert_eq!(owners(manager.store(), "org/a.jar"), vec!["old", "new"]);
  assert_eq!(manager.store().body("org/a.jar").unwrap().as_ref(), b"legacy");
}

#[tokio::test]
async fn owner_merge_preserves_unknown_metadata() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "body");
  let digest = digest_bytes(b"body");
  let store = MemoryStore::new();
  store.insert(
    "org/a.jar",
    "body",
    meta(&[
      ("checksum", digest.as_str()),
      ("rh-products", "A"),
      ("build-id", "1234"),
    ]),
  );
  let manager = ObjectManager::new(store);

  manager.upload_files(&[jar], Some(&p("B")), &fx.root()).await;

  let stored = manager.store().metadata("org/a.jar").unwrap();
  assert_eq!(stored.get("build-id").map(String::as_str), Some("1234"));
  assert_eq!(stored.get("rh-products").map(String::as_str), Some("A,B"));
}

#[tokio::test]
async fn root_with_and_without_trailing_slash_yield_same_key() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "x");
  let manager = ObjectManager::new(MemoryStore::new());

  let plain = manager.upload_files(&[jar.clone()], Some(&p("a")), &fx.root()).await;
  let slashed = manager
    .upload_files(&[jar], Some(&p("b")), &format!("{}/", fx.root()))
    .await;

  assert_eq!(plain.succeeded[0].key, "org/a.jar");
  assert_eq!(slashed.succeeded[0].key, "org/a.jar");
  assert_eq!(owners(manager.store(), "org/a.jar"), vec!["a", "b"]);
}

#[tokio::test]
async fn large_batch_reports_in_input_order() {
  let fx = Fixture::new();
  let paths: Vec<_> = (0..40)
    .map(|i| fx.write(&format!("f{i:02}.txt"), &format!("content {i}")))
    .collect();
  let manager = ObjectManager::new(MemoryStore::new());

  let report = manager.upload_files(&paths, Some(&p("x")), &fx.root()).await;

  assert!(report.is_success());
  assert_eq!(report.count(Outcome::Created), 40);
  let keys: Vec<_> = report.succeeded.iter().map(|r| r.key.clone()).collect();
  let expected: Vec<_> = (0..40).map(|i| format!("f{i:02}.txt")).collect();
  assert_eq!(keys, expected);
}

#[tokio::test]
async fn body_is_streamed_from_disk_only_when_written() {
  let fx = Fixture::new();
  let jar = fx.write("org/a.jar", "payload");
  let manager = ObjectManager::new(RecordingStore::new(MemoryStore::new()));

  manager.upload_files(&[jar.clone()], Some(&p("A")), &fx.root()).await;
  let report = manager.upload_files(&[jar.clone()], Some(&p("B")), &fx.root()).await;

  assert_eq!(report.outcome_of("org/a.jar"), Some(Outcome::OwnerAdded));
  let bodies = manager.store().bodies();
  assert_eq!(bodies, vec![("org/a.jar".to_string(), ObjectBody::File(jar))]);
  assert_eq!(manager.store().inner.body("org/a.jar").unwrap().as_ref(), b"payload");
}
