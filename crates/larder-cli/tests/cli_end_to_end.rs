use std::io::Write;

use assert_cmd::Command;
use httpmock::MockServer;
use predicates::str::contains;
use tempfile::NamedTempFile;

fn larder_cli() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("larder-cli"));
    cmd.env_remove("LARDER_SERVER");
    cmd
}

#[test]
fn health_works_end_to_end() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/health");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"status":"ok","service":"larder"}"#);
    });

    let assert = larder_cli()
        .env("LARDER_SERVER", server.base_url())
        .arg("health")
        .assert()
        .success();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("\"status\": \"ok\""));
    mock.assert();
}

#[test]
fn generate_sends_flags_as_request_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/generate")
            .header("x-request-id", "cli-req-1")
            .json_body_includes(
                r#"{"ingredients":["egg","rice"],"cuisine":["Indian"],"mealType":["Breakfast"],"diet":"veg"}"#,
            );
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"items":[{"name":"Egg Fried Rice","recipe":["Cook"],"calories":"450"}]}"#);
    });

    let assert = larder_cli()
        .args(["--server", &server.base_url(), "--request-id", "cli-req-1"])
        .args(["generate", "-i", "egg", "-i", "rice", "-c", "Indian"])
        .args(["-m", "Breakfast", "-d", "veg"])
        .assert()
        .success();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    assert!(output.contains("\"name\": \"Egg Fried Rice\""));
    assert!(output.contains("\"calories\": \"450\""));
    mock.assert();
}

#[test]
fn generate_reads_request_file() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/generate")
            .json_body_includes(r#"{"ingredients":["tofu"],"cuisine":"Thai","mealType":"Dinner"}"#);
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"items":[]}"#);
    });

    let mut file = NamedTempFile::new().expect("tmp file");
    file.write_all(br#"{"ingredients":["tofu"],"cuisine":"Thai","mealType":"Dinner"}"#)
        .expect("write request");

    larder_cli()
        .env("LARDER_SERVER", server.base_url())
        .arg("generate")
        .arg("--file")
        .arg(file.path())
        .assert()
        .success()
        .stdout(contains("\"items\": []"));
    mock.assert();
}

#[test]
fn api_errors_surface_the_gateway_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/generate");
        then.status(429)
            .header("content-type", "application/json")
            .header("retry-after", "17")
            .body(r#"{"error":"Rate limit reached"}"#);
    });

    larder_cli()
        .env("LARDER_SERVER", server.base_url())
        .args(["generate", "-i", "egg", "-c", "Indian", "-m", "Lunch"])
        .assert()
        .failure()
        .stderr(contains("Rate limit reached"))
        .stderr(contains("retry_after: Some(17)"));
}

#[test]
fn missing_server_fails_fast() {
    larder_cli()
        .arg("health")
        .assert()
        .failure()
        .stderr(contains("MissingServer"));
}
