use assert_cmd::Command;
use once_cell::sync::Lazy;
use predicates::str::contains;
use std::env;
use std::fs::write;
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn reset_env() {
    env::remove_var("SMELL_PROBE_PROVIDER");
    env::remove_var("OPENROUTER_API_KEY");
    env::remove_var("SMELL_PROBE_ENDPOINT");
    env::remove_var("SMELL_PROBE_TIMEOUT_SECS");
    env::remove_var("SMELL_PROBE_MAX_RETRIES");
    env::remove_var("PORT");
    env::remove_var("DB_NAME");
    env::remove_var("DB_URL");
    env::remove_var("DB_AUTH_TOKEN");
}

fn smell_probe(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("smell-probe").unwrap();
    cmd.current_dir(dir.path()).env("NO_COLOR", "1");
    cmd
}

#[test]
fn schema_lists_every_key() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();

    smell_probe(&dir)
        .arg("schema")
        .assert()
        .success()
        .stdout(contains("data_class_smell"))
        .stdout(contains("tell_dont_ask_principle_violation"));
}

#[test]
fn list_models_emits_catalog_json() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();

    smell_probe(&dir)
        .args(["list-models", "--json"])
        .assert()
        .success()
        .stdout(contains("\"id\": \"anthropic/claude-3-7-sonnet\""))
        .stdout(contains("\"display_name\": \"deepseek v3\""));
}

#[test]
fn list_models_honours_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("smell-probe.toml");
    write(
        &config,
        "[batch]\nmodels = [{ id = \"vendor/solo\", display_name = \"solo\" }]\n",
    )
    .unwrap();

    smell_probe(&dir)
        .args(["--config", config.to_str().unwrap(), "list-models"])
        .assert()
        .success()
        .stdout(contains("1 model(s) queried per snippet"))
        .stdout(contains("vendor/solo"));
}

#[test]
fn analyze_reads_snippet_from_stdin() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();

    smell_probe(&dir)
        .env("SMELL_PROBE_PROVIDER", "noop")
        .args(["analyze", "--json"])
        .write_stdin("class Foo {}")
        .assert()
        .success()
        .stdout(contains("\"containsJson\": false"))
        .stdout(contains("\"data_class_smell\": false"));
}

#[test]
fn analyze_rejects_blank_snippet() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();

    smell_probe(&dir)
        .env("SMELL_PROBE_PROVIDER", "noop")
        .arg("analyze")
        .write_stdin("   \n")
        .assert()
        .failure()
        .stderr(contains("code"));
}

#[test]
fn analyze_requires_api_key_for_openrouter() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();

    smell_probe(&dir)
        .arg("analyze")
        .write_stdin("class Foo {}")
        .assert()
        .failure()
        .stderr(contains("OPENROUTER_API_KEY"));
}

#[test]
fn add_source_then_batch_persists_rows() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("results.db");
    let snippet = dir.path().join("Foo.java");
    write(&snippet, "class Foo { int x; }").unwrap();

    smell_probe(&dir)
        .env("DB_NAME", &db)
        .args(["add-source", snippet.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("1"));

    smell_probe(&dir)
        .env("DB_NAME", &db)
        .env("SMELL_PROBE_PROVIDER", "noop")
        .args(["batch", "--json"])
        .assert()
        .success()
        .stdout(contains("\"sources\": 1"))
        .stdout(contains("\"pairs\": 4"))
        .stdout(contains("\"persisted\": 4"))
        .stdout(contains("\"provider_failures\": 0"));
}

#[test]
fn batch_on_empty_database_reports_nothing_to_do() {
    let _guard = ENV_LOCK.lock().unwrap();
    reset_env();
    let dir = tempfile::tempdir().unwrap();

    smell_probe(&dir)
        .env("DB_NAME", dir.path().join("empty.db"))
        .env("SMELL_PROBE_PROVIDER", "noop")
        .arg("batch")
        .assert()
        .success()
        .stdout(contains("Batch complete"))
        .stdout(contains("pairs:                0"));
}
