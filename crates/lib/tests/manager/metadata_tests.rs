use shelf_lib::digest::digest_bytes;
use shelf_lib::store::memory::MemoryStore;
use shelf_lib::{FailureKind, ObjectManager, Outcome};

use super::common::{Fixture, digest_of, meta, owners, p};

#[tokio::test]
async fn changed_metadata_file_is_rewritten_not_rejected() {
  let fx = Fixture::new();
  let index = fx.write("org/maven-metadata.xml", "v1");
  let manager = ObjectManager::new(MemoryStore::new());
  manager.upload_metadata(&[index.clone()], Some(&p("P")), &fx.root()).await;

  std::fs::write(&index, "v2").unwrap();
  let report = manager.upload_metadata(&[index], Some(&p("P")), &fx.root()).await;

  assert!(report.is_success());
  assert_eq!(report.outcome_of("org/maven-metadata.xml"), Some(Outcome::Rewritten));
  let store = manager.store();
  assert_eq!(store.body("org/maven-metadata.xml").unwrap().as_ref(), b"v2");
  assert_eq!(digest_of(store, "org/maven-metadata.xml"), Some(digest_bytes(b"v2")));
  assert_eq!(owners(store, "org/maven-metadata.xml"), vec!["P"]);
  assert_eq!(store.ops().puts, 2);
}

#[tokio::test]
async fn unchanged_metadata_file_only_merges_owner() {
  let fx = Fixture::new();
  let index = fx.write("org/maven-metadata.xml", "same");
  let manager = ObjectManager::new(MemoryStore::new());
  manager.upload_metadata(&[index.clone()], Some(&p("A")), &fx.root()).await;

  let report = manager.upload_metadata(&[index], Some(&p("B")), &fx.root()).await;

  assert_eq!(
    report.outcome_of("org/maven-metadata.xml"),
    Some(Outcome::MetadataUpdated)
  );
  let store = manager.store();
  assert_eq!(owners(store, "org/maven-metadata.xml"), vec!["A", "B"]);
  assert_eq!(store.ops().puts, 1);
  assert_eq!(store.ops().metadata_updates, 1);
}

#[tokio::test]
async fn rewrite_keeps_existing_owners_and_extra_keys() {
  let fx = Fixture::new();
  let index = fx.write("org/maven-metadata.xml", "fresh");
  let store = MemoryStore::new();
  store.insert(
    "org/maven-metadata.xml",
    "stale",
    meta(&[("checksum", "d1"), ("rh-products", "A"), ("origin", "import")]),
  );
  let manager = ObjectManager::new(store);

  let report = manager.upload_metadata(&[index], Some(&p("B")), &fx.root()).await;

  assert_eq!(report.outcome_of("org/maven-metadata.xml"), Some(Outcome::Rewritten));
  let stored = manager.store().metadata("org/maven-metadata.xml").unwrap();
  let digest = digest_bytes(b"fresh");
  assert_eq!(
    stored,
    meta(&[("checksum", digest.as_str()), ("rh-products", "A,B"), ("origin", "import")])
  );
}

#[tokio::test]
async fn missing_metadata_file_is_reported() {
  let fx = Fixture::new();
  let manager = ObjectManager::new(MemoryStore::new());

  let report = manager
    .upload_metadata(&[fx.path("org/maven-metadata.xml")], Some(&p("P")), &fx.root())
    .await;

  assert_eq!(report.failed.len(), 1);
  assert_eq!(report.failed[0].kind, FailureKind::LocalFileMissing);
  assert!(manager.store().is_empty());
}
