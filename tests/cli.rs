use assert_cmd::Command;
use std::io::Write;
use std::path::PathBuf;
use std::process::Output;
use std::str;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

/// Build a qqwrysed command reading its database from `db`
fn qqwrysed(db: &str) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("qqwrysed").unwrap();
    cmd.env("QQWRYSED_DB", fixture(db).as_os_str())
        .env_remove("QQWRYSED_LOG");
    cmd
}

/// Generic execution function that invokes qqwrysed against a fixture database
fn run_qqwrysed(db: &str, input: &str, args: &[&str]) -> Output {
    qqwrysed(db)
        .args(args)
        .write_stdin(input)
        .output()
        .expect("failed to execute")
}

fn stdout(output: &Output) -> &str {
    str::from_utf8(&output.stdout).expect("Failed to read stdout as UTF-8")
}

#[test]
fn basic_replacement() {
    let output = run_qqwrysed("two-ranges.dat", "ip is 1.0.0.5 and 1.0.1.9\n", &[]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "ip is CN-Beijing and CN-Shanghai\n");
}

#[test]
fn unmatched_text_unchanged() {
    let input = "no ip here\n1.0.2.1 is outside every range\nlast line without newline";
    let output = run_qqwrysed("two-ranges.dat", input, &[]);
    assert_eq!(stdout(&output), input);
}

#[test]
fn redirected_records() {
    let output = run_qqwrysed(
        "sample.dat",
        "a=1.0.2.9 b=1.0.6.1 c=1.0.9.9 d=2.0.0.2 e=8.8.8.8\n",
        &[],
    );
    assert_eq!(
        stdout(&output),
        "a=JP-Tokyo b=AU-Sydney c=JP- d=FR- e=US-Mountain View\n"
    );
}

#[test]
fn wildcard_tokens() {
    // every `*` reads as 1: 1.0.*.* is 1.0.1.1 and 8.8.*.* is 8.8.1.1, which no range covers
    let output = run_qqwrysed(
        "sample.dat",
        "masked 1.0.*.* and 1.0.0.* but not 8.8.*.*\n",
        &[],
    );
    assert_eq!(
        stdout(&output),
        "masked JP-Tokyo and CN-Beijing but not 8.8.*.*\n"
    );
}

#[test]
fn raw_bytes_pass_through() {
    let output = run_qqwrysed("sample.dat", "36.0.0.1\n", &[]);
    assert_eq!(output.stdout, b"\xd6\xd0\xb9\xfa-\xb1\xb1\xbe\xa9\n");
}

#[test]
fn custom_template() {
    let output = run_qqwrysed(
        "two-ranges.dat",
        "seen 1.0.0.5\n",
        &["-t", "<{ip}|{country}|{area}>"],
    );
    assert_eq!(stdout(&output), "seen <1.0.0.5|CN|Beijing>\n");
}

#[test]
fn invalid_template_fails() {
    let output = run_qqwrysed("two-ranges.dat", "1.0.0.5\n", &["-t", "{asnnum}"]);
    assert!(!output.status.success());
    let stderr = str::from_utf8(&output.stderr).unwrap();
    assert!(stderr.contains("invalid template"), "stderr: {stderr}");
}

#[test]
fn color_always() {
    let output = run_qqwrysed("two-ranges.dat", "1.0.0.5\n", &["-C", "always"]);
    assert_eq!(stdout(&output), "\x1b[1;31mCN-Beijing\x1b[0;0m\n");
}

#[test]
fn no_scrub_is_passthrough() {
    let output = run_qqwrysed("two-ranges.dat", "ip is 1.0.0.5\n", &["--no-scrub"]);
    assert_eq!(stdout(&output), "ip is 1.0.0.5\n");
}

#[test]
fn no_scrub_only_matching_prints_tokens() {
    let output = run_qqwrysed("two-ranges.dat", "x 1.0.0.5 y\n", &["--no-scrub", "-o"]);
    assert_eq!(stdout(&output), "1.0.0.5\n");
}

#[test]
fn only_matching() {
    let output = run_qqwrysed(
        "two-ranges.dat",
        "a 1.0.0.5 b 1.0.2.1\nc 1.0.1.9\n",
        &["-o"],
    );
    assert_eq!(stdout(&output), "CN-Beijing\n1.0.2.1\nCN-Shanghai\n");
}

#[test]
fn tag_json() {
    let output = run_qqwrysed("two-ranges.dat", "from 1.0.0.5\nnothing\n", &["--tag"]);
    let lines: Vec<&str> = stdout(&output).lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["tags"][0]["value"], "1.0.0.5");
    assert_eq!(first["tags"][0]["decorated"], "CN-Beijing");
    assert_eq!(first["tags"][0]["range"]["start"], 5);
    assert_eq!(first["data"]["text"], "from 1.0.0.5\n");

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert!(second["tags"].as_array().unwrap().is_empty());
}

#[test]
fn lookup_addresses() {
    let output = run_qqwrysed(
        "two-ranges.dat",
        "",
        &["-l", "1.0.0.5", "16777481", "1.0.2.1", "bogus"],
    );
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "1.0.0.5\tCN-Beijing\n16777481\tCN-Shanghai\n1.0.2.1\t-\nbogus\t-\n"
    );
}

#[test]
fn database_info() {
    let output = run_qqwrysed("two-ranges.dat", "", &["--info"]);
    assert_eq!(stdout(&output), "size\t53\nindex\t39..53\nrecords\t2\n");
}

#[test]
fn list_templates() {
    let output = run_qqwrysed("two-ranges.dat", "", &["--list-templates"]);
    let out = stdout(&output);
    for field in ["{ip}", "{country}", "{area}"] {
        assert!(out.contains(field), "missing {field} in {out}");
    }
}

#[test]
fn mmap_database() {
    let output = run_qqwrysed("sample.dat", "8.8.8.8\n", &["--mmap"]);
    assert_eq!(stdout(&output), "US-Mountain View\n");
}

#[test]
fn database_flag_overrides_env() {
    let output = qqwrysed("missing.dat")
        .args(["-d", fixture("two-ranges.dat").to_str().unwrap()])
        .write_stdin("1.0.1.1\n")
        .output()
        .unwrap();
    assert_eq!(stdout(&output), "CN-Shanghai\n");
}

#[test]
fn missing_database_passes_through() {
    let output = run_qqwrysed("missing.dat", "ip is 1.0.0.5\n", &[]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "ip is 1.0.0.5\n");
    let stderr = str::from_utf8(&output.stderr).unwrap();
    assert!(stderr.contains("scrubbing disabled"), "stderr: {stderr}");
}

#[test]
fn missing_database_fails_lookup() {
    let output = run_qqwrysed("missing.dat", "", &["-l", "1.0.0.5"]);
    assert!(!output.status.success());
    let stderr = str::from_utf8(&output.stderr).unwrap();
    assert!(stderr.contains("failed to read database"), "stderr: {stderr}");
}

#[test]
fn corrupt_database_passes_through() {
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&[0x10, 0, 0, 0, 0x08, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0])
        .unwrap();
    #[allow(deprecated)]
    let output = Command::cargo_bin("qqwrysed")
        .unwrap()
        .env("QQWRYSED_DB", tmp.path())
        .write_stdin("1.0.0.5\n")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output), "1.0.0.5\n");
}

#[test]
fn cloak_user_id() {
    let output = run_qqwrysed(
        "two-ranges.dat",
        "\x1b[36mAlice\x1b[0m from 1.0.0.5\nalice stays\n",
        &["--cloak-id", "alice", "--cloak-as", "anon"],
    );
    assert_eq!(
        stdout(&output),
        "\x1b[36manon\x1b[0m from CN-Beijing\nalice stays\n"
    );
}

#[test]
fn cloak_needs_both_flags() {
    let output = run_qqwrysed("two-ranges.dat", "", &["--cloak-id", "alice"]);
    assert!(!output.status.success());
}

#[test]
fn file_inputs() {
    let mut first = tempfile::NamedTempFile::new().unwrap();
    first.write_all(b"first 1.0.0.5\n").unwrap();
    let mut second = tempfile::NamedTempFile::new().unwrap();
    second.write_all(b"second 1.0.1.9\n").unwrap();

    let output = qqwrysed("two-ranges.dat")
        .arg(first.path())
        .arg("-")
        .arg(second.path())
        .write_stdin("stdin 1.0.0.6\n")
        .output()
        .unwrap();
    assert_eq!(
        stdout(&output),
        "first CN-Beijing\nstdin CN-Beijing\nsecond CN-Shanghai\n"
    );
}

#[test]
fn missing_input_file_fails() {
    let output = run_qqwrysed("two-ranges.dat", "", &["no/such/file.log"]);
    assert!(!output.status.success());
    let stderr = str::from_utf8(&output.stderr).unwrap();
    assert!(stderr.contains("failed to open file"), "stderr: {stderr}");
}

#[test]
fn debug_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("debug.log");
    let output = run_qqwrysed(
        "two-ranges.dat",
        "1.0.0.5\n",
        &["--debug-log", log.to_str().unwrap()],
    );
    assert_eq!(stdout(&output), "CN-Beijing\n");
    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("database loaded"), "log: {contents}");
    assert!(contents.contains("DEBUG"), "log: {contents}");
}
