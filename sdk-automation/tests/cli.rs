use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{create_dir_all, read_to_string, write};
use std::path::Path;
use tempfile::tempdir;

/// Writes a TypeSpec project whose service-dir is not `sdk/<name>`.
fn write_bad_project(spec_folder: &Path) -> &'static str {
    let folder = "specification/foo/resource-manager/Microsoft.Foo/Foo";
    let project = spec_folder.join(folder);
    create_dir_all(&project).expect("create project dir");
    write(
        project.join("tspconfig.yaml"),
        "parameters:\n  service-dir:\n    default: \"not-sdk/foo\"\noptions:\n  \"@azure-tools/typespec-java\":\n    package-dir: \"azure-resourcemanager-foo\"\n",
    )
    .expect("write tspconfig");
    folder
}

#[test]
fn batch_with_bad_tspconfig_reports_failed_package_and_exits_1() {
    let specs = tempdir().unwrap();
    let sdk = tempdir().unwrap();
    let folder = write_bad_project(specs.path());

    let input = sdk.path().join("input.json");
    let output = sdk.path().join("output.json");
    write(
        &input,
        format!(
            r#"{{"specFolder": "{}", "relatedTypeSpecProjectFolder": ["{folder}"]}}"#,
            specs.path().display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("sdk-automation").expect("Binary exists");
    cmd.arg("--sdk-root").arg(sdk.path()).arg(&input).arg(&output);
    cmd.assert().code(1);

    let report: serde_json::Value =
        serde_json::from_str(&read_to_string(&output).expect("output written")).unwrap();
    let packages = report["packages"].as_array().expect("packages array");
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0]["result"], "failed");
    assert_eq!(packages[0]["typespecProject"][0], folder);
    // Nothing was generated.
    assert!(!sdk.path().join("sdk").exists());
}

#[test]
fn inconsistent_release_parameters_abort_the_batch() {
    let sdk = tempdir().unwrap();
    let input = sdk.path().join("input.json");
    let output = sdk.path().join("output.json");
    write(
        &input,
        r#"{"specFolder": ".", "runMode": "release", "apiVersion": "2024-01-01-preview", "sdkReleaseType": "stable"}"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("sdk-automation").expect("Binary exists");
    cmd.arg("--sdk-root").arg(sdk.path()).arg(&input).arg(&output);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("preview"));
    assert!(!output.exists());
}

#[test]
fn single_readme_with_failing_generator_prints_failed_record() {
    let sdk = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("sdk-automation").expect("Binary exists");
    cmd.arg("--sdk-root")
        .arg(sdk.path())
        .arg("--autorest")
        .arg(sdk.path().join("no-such-generator"))
        .arg("-r")
        .arg("specification/foo/resource-manager/readme.md");

    cmd.assert()
        .code(1)
        .stdout(
            predicate::str::contains("\"packageName\": \"azure-resourcemanager-foo\"")
                .and(predicate::str::contains("\"result\": \"failed\"")),
        );
}

#[test]
fn missing_pointer_is_an_error() {
    let sdk = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("sdk-automation").expect("Binary exists");
    cmd.arg("--sdk-root").arg(sdk.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--readme"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use sdk_automation::cli::{run, Cli};

    // No pointer: run() logs, then fails on the missing argument.
    let sdk = tempdir().unwrap();
    let cli = Cli {
        sdk_root: Some(sdk.path().to_path_buf()),
        ..Cli::default()
    };
    assert!(run(cli).await.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
