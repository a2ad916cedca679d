use assert_cmd::Command;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated home for one test: its own database and config file, and no
/// remote settings leaking in from the environment.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn initialized() -> Self {
        let ws = Self::new();
        ws.ok(&["init"]);
        ws
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("ledger.db")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("ledger-sync").expect("binary");
        cmd.env("LEDGER_SYNC_CONFIG", self.dir.path().join("config.json"))
            .env_remove("LEDGER_SYNC_ENDPOINT")
            .env_remove("LEDGER_SYNC_API_KEY")
            .env_remove("LEDGER_SYNC_TOKEN")
            .env_remove("LEDGER_SYNC_OWNER")
            .env_remove("LEDGER_SYNC_TEST_DB")
            .env_remove("RUST_LOG")
            .arg("--db")
            .arg(self.db())
            .arg("--json");
        cmd
    }

    fn ok(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().expect("run");
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout json")
    }

    /// Run a command expected to fail; returns the exit code and the
    /// structured error printed on stderr.
    fn err(&self, args: &[&str]) -> (i32, Value) {
        let output = self.cmd().args(args).output().expect("run");
        assert!(!output.status.success(), "{args:?} unexpectedly succeeded");
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .expect("stderr output");
        (
            output.status.code().expect("exit code"),
            serde_json::from_str(last).expect("stderr json"),
        )
    }
}

#[test]
fn version_reports_package_version() {
    let ws = Workspace::new();
    let out = ws.ok(&["version"]);
    assert_eq!(out["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn commands_require_init() {
    let ws = Workspace::new();
    let (code, err) = ws.err(&["tx", "list"]);
    assert_eq!(code, 2);
    assert_eq!(err["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn init_twice_needs_force() {
    let ws = Workspace::initialized();
    assert!(ws.db().exists());

    let (code, err) = ws.err(&["init"]);
    assert_eq!(code, 2);
    assert_eq!(err["error"]["code"], "ALREADY_INITIALIZED");

    let out = ws.ok(&["init", "--force"]);
    assert_eq!(out["reinitialized"], true);
}

#[test]
fn tx_add_queues_locally_without_remote() {
    let ws = Workspace::initialized();

    let out = ws.ok(&[
        "tx", "add", "12.5", "--category", "Food", "--kind", "spend", "--date", "2026-03-01",
    ]);
    let tx = &out["transaction"];
    assert!(tx["local_id"].as_str().unwrap().starts_with("tmp_"));
    assert_eq!(tx["kind"], "expense");
    assert_eq!(tx["synced"], false);
    assert!(tx["remote_id"].is_null());
    assert!(out.get("sync").is_none());

    let list = ws.ok(&["tx", "list", "--pending"]);
    assert_eq!(list["count"], 1);
    assert_eq!(list["transactions"][0]["category"], "Food");

    let local_id = tx["local_id"].as_str().unwrap();
    let shown = ws.ok(&["tx", "show", local_id]);
    assert_eq!(shown["transaction"]["amount"], 12.5);
    assert_eq!(shown["history"][0]["event"], "transaction_recorded");
}

#[test]
fn tx_add_stamps_known_owner() {
    let ws = Workspace::initialized();
    let out = ws.ok(&["--owner", "user-1", "tx", "add", "3", "--category", "Coffee"]);
    assert_eq!(out["transaction"]["owner_id"], "user-1");
}

#[test]
fn tx_add_rejects_bad_input() {
    let ws = Workspace::initialized();

    let (code, err) = ws.err(&["tx", "add", "5", "--category", "Food", "--kind", "expence"]);
    assert_eq!(code, 4);
    assert_eq!(err["error"]["code"], "INVALID_KIND");
    assert!(err["error"]["hint"].as_str().unwrap().contains("expense"));

    let (code, _) = ws.err(&["tx", "add", "0", "--category", "Food"]);
    assert_eq!(code, 4);

    let (code, _) = ws.err(&["tx", "add", "5", "--category", "Food", "--date", "03/01/2026"]);
    assert_eq!(code, 4);
}

#[test]
fn tx_show_unknown_id_is_not_found() {
    let ws = Workspace::initialized();
    let (code, err) = ws.err(&["tx", "show", "tmp_missing"]);
    assert_eq!(code, 3);
    assert_eq!(err["error"]["code"], "TRANSACTION_NOT_FOUND");
}

#[test]
fn sync_without_endpoint_is_config_error() {
    let ws = Workspace::initialized();
    let (code, err) = ws.err(&["sync"]);
    assert_eq!(code, 7);
    assert_eq!(err["error"]["code"], "CONFIG_ERROR");
}

#[test]
fn offline_sync_is_skipped_and_recorded() {
    let ws = Workspace::initialized();
    ws.ok(&["tx", "add", "20", "--category", "Books", "--no-sync"]);

    let summary = ws.ok(&["--offline", "sync"]);
    assert_eq!(summary["skipped"], true);
    assert_eq!(summary["skip_reason"], "offline");
    assert_eq!(summary["trigger"], "manual");
    assert_eq!(summary["total_count"], 0);

    let status = ws.ok(&["status"]);
    assert_eq!(status["pending"]["transactions"], 1);
    assert_eq!(status["pending"]["total"], 1);
    assert_eq!(status["remote_configured"], false);
    assert_eq!(status["last_sync"]["skip_reason"], "offline");
}

#[test]
fn write_fires_offline_write_trigger_when_remote_configured() {
    let ws = Workspace::initialized();
    ws.ok(&["config", "set", "remote.endpoint", "http://127.0.0.1:9"]);

    let out = ws.ok(&["--offline", "tx", "add", "7.25", "--category", "Lunch"]);
    assert_eq!(out["sync"]["trigger"], "offline-write");
    assert_eq!(out["sync"]["skipped"], true);
    assert_eq!(out["transaction"]["synced"], false);

    let status = ws.ok(&["status"]);
    assert_eq!(status["remote_configured"], true);
    assert_eq!(status["last_sync"]["trigger"], "offline-write");
    assert_eq!(status["pending"]["transactions"], 1);
}

#[test]
fn profile_needs_an_owner() {
    let ws = Workspace::initialized();
    let (code, err) = ws.err(&["profile", "set", "--name", "Ada"]);
    assert_eq!(code, 3);
    assert_eq!(err["error"]["code"], "NO_SESSION");
}

#[test]
fn profile_set_and_update() {
    let ws = Workspace::initialized();

    let out = ws.ok(&["--owner", "u1", "profile", "set", "--name", "Ada", "--currency", "eur"]);
    assert_eq!(out["profile"]["owner_id"], "u1");
    assert_eq!(out["profile"]["currency"], "EUR");

    ws.ok(&["--owner", "u1", "profile", "set", "--income", "4200"]);
    let shown = ws.ok(&["--owner", "u1", "profile", "show"]);
    assert_eq!(shown["display_name"], "Ada");
    assert_eq!(shown["monthly_income"], 4200.0);
    assert_eq!(shown["synced"], false);

    let (code, err) = ws.err(&["--owner", "u2", "profile", "show"]);
    assert_eq!(code, 3);
    assert_eq!(err["error"]["code"], "PROFILE_NOT_FOUND");
}

#[test]
fn forecast_set_replaces_same_month() {
    let ws = Workspace::initialized();

    let first = ws.ok(&["forecast", "set", "mar", "--income", "100", "--expenses", "40"]);
    assert_eq!(first["forecast"]["month_index"], 2);
    assert_eq!(first["replaced"], false);

    let second = ws.ok(&["forecast", "set", "2", "--income", "150", "--expenses", "40"]);
    assert_eq!(second["replaced"], true);
    assert_eq!(second["forecast"]["local_id"], first["forecast"]["local_id"]);

    let list = ws.ok(&["forecast", "list"]);
    assert_eq!(list["count"], 1);
    assert_eq!(list["forecasts"][0]["projected_income"], 150.0);

    let (code, _) = ws.err(&["forecast", "set", "13"]);
    assert_eq!(code, 4);
}

#[test]
fn config_set_and_show_masks_secrets() {
    let ws = Workspace::new();

    ws.ok(&["config", "set", "remote.api_key", "anon-key-123456789"]);
    ws.ok(&["config", "set", "sync.policy", "fail-fast"]);

    let shown = ws.ok(&["config", "show"]);
    assert_eq!(shown["remote"]["api_key"], "****6789");
    assert_eq!(shown["sync"]["policy"], "fail-fast");

    let (code, err) = ws.err(&["config", "set", "remote.endpont", "x"]);
    assert_eq!(code, 7);
    assert!(err["error"]["message"]
        .as_str()
        .unwrap()
        .contains("remote.endpoint"));
}
