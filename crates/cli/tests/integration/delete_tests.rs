use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn delete_releases_then_removes() {
  let env = TestEnv::new();
  env.write_file("org/a.jar", "shared");
  env.batch_cmd("upload", "A", &["org/a.jar"]).assert().success();
  env.batch_cmd("upload", "B", &["org/a.jar"]).assert().success();

  env
    .batch_cmd("delete", "A", &["org/a.jar"])
    .assert()
    .success()
    .stdout(predicate::str::contains("released"));
  assert_eq!(env.stored_owners("org/a.jar"), "B");

  env
    .batch_cmd("delete", "B", &["org/a.jar"])
    .assert()
    .success()
    .stdout(predicate::str::contains("deleted"));
  assert!(env.stored_body("org/a.jar").is_none());
}

#[test]
fn delete_does_not_need_local_files() {
  let env = TestEnv::new();
  let jar = env.write_file("org/a.jar", "a");
  env.batch_cmd("upload", "A", &["org/a.jar"]).assert().success();
  std::fs::remove_file(jar).unwrap();

  env.batch_cmd("delete", "A", &["org/a.jar"]).assert().success();

  assert!(env.stored_body("org/a.jar").is_none());
}

#[test]
fn delete_by_non_owner_keeps_object() {
  let env = TestEnv::new();
  env.write_file("org/a.jar", "a");
  env.batch_cmd("upload", "A", &["org/a.jar"]).assert().success();

  env.batch_cmd("delete", "C", &["org/a.jar"]).assert().success();

  assert_eq!(env.stored_owners("org/a.jar"), "A");
  assert!(env.stored_body("org/a.jar").is_some());
}

#[test]
fn delete_of_absent_key_succeeds() {
  let env = TestEnv::new();

  env
    .batch_cmd("delete", "A", &["org/never-uploaded.jar"])
    .arg("--verbose")
    .assert()
    .success()
    .stdout(predicate::str::contains("absent"));
}

#[test]
fn delete_without_product_warns_and_changes_nothing() {
  let env = TestEnv::new();
  env.write_file("org/a.jar", "a");
  env.batch_cmd("upload", "A", &["org/a.jar"]).assert().success();

  env
    .store_cmd()
    .arg("delete")
    .arg("--root")
    .arg(env.repo())
    .arg("org/a.jar")
    .assert()
    .success()
    .stderr(predicate::str::contains("No --product given"));

  assert_eq!(env.stored_owners("org/a.jar"), "A");
}

#[test]
fn delete_walks_root_when_no_paths_given() {
  let env = TestEnv::new();
  env.write_file("org/a.jar", "a");
  env.write_file("org/b.jar", "b");
  env.batch_cmd("upload", "A", &[]).assert().success();

  env.batch_cmd("delete", "A", &[]).assert().success();

  assert!(env.stored_body("org/a.jar").is_none());
  assert!(env.stored_body("org/b.jar").is_none());
}

#[cfg(unix)]
#[test]
fn delete_through_symlinked_root_after_local_removal() {
  let env = TestEnv::new();
  let jar = env.write_file("org/a.jar", "a");
  let link = env.temp.path().join("link");
  std::os::unix::fs::symlink(env.repo(), &link).unwrap();
  let linked_jar = link.join("org/a.jar");

  let run = |subcommand: &str| {
    let mut cmd = env.store_cmd();
    cmd
      .arg(subcommand)
      .args(["--product", "P", "--root"])
      .arg(&link)
      .arg(&linked_jar);
    cmd
  };

  run("upload").assert().success().stdout(predicate::str::contains("org/a.jar"));
  std::fs::remove_file(jar).unwrap();

  run("delete")
    .assert()
    .success()
    .stdout(predicate::str::contains("deleted"));
  assert!(env.stored_body("org/a.jar").is_none());
}
