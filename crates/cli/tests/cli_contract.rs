use assert_cmd::cargo::cargo_bin_cmd;
use pdf_engine::fixtures::PdfFixture;
use pdf_engine::PdfDocument;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const PREAMBLE: &str = "Acme Textiles Pvt Ltd\nMonthly contribution register\nMonth,March\n,\nPrepared by,HR\n,\n";

/// Register with the six preamble rows the default profile skips.
fn write_register(dir: &Path) -> PathBuf {
    let path = dir.join("register.csv");
    let rows = "Name,UAN No.,ESI No\n\
                Asha,100200300400,3312345678\n\
                Ravi,Exempted,3398765432\n\
                Meena,100200300999,Exempted\n\
                Arun,100200300777,\n";
    fs::write(&path, format!("{PREAMBLE}{rows}")).expect("register should be written");
    path
}

fn write_pdf(dir: &Path, name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, PdfFixture::text_pages(pages).build()).expect("pdf should be written");
    path
}

fn profile_arg(dir: &Path) -> PathBuf {
    dir.join("profile.json")
}

fn page_texts(path: &Path) -> Vec<String> {
    let document = PdfDocument::open(path).expect("output should be a readable PDF");
    (0..document.page_count())
        .map(|page| document.layout(page).expect("layout").text().to_owned())
        .collect()
}

#[test]
fn mark_emits_stable_json_report() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());
    let pdf = write_pdf(temp.path(), "uan.pdf", &["UAN register", "Asha 100200300400", "nobody", "Meena 100200300999"]);
    let output_path = temp.path().join("out").join("marked.pdf");

    let output = cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("mark")
        .arg(&pdf)
        .arg("--table")
        .arg(&table)
        .arg("--output")
        .arg(&output_path)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let mut value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    value["input"] = Value::String("<INPUT>".to_owned());
    value["output"] = Value::String("<OUTPUT>".to_owned());

    insta::with_settings!({ sort_maps => true }, {
        insta::assert_json_snapshot!("mark_json_report", value);
    });

    assert_eq!(page_texts(&output_path), vec!["UAN register", "Asha 100200300400", "Meena 100200300999"]);
}

#[test]
fn mark_writes_default_output_and_summary() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());
    let pdf = write_pdf(temp.path(), "esi.pdf", &["ESI register", "nothing", "3398765432 Ravi"]);

    cargo_bin_cmd!("uan-marker")
        .arg("mark")
        .arg(&pdf)
        .arg("--table")
        .arg(&table)
        .arg("--column")
        .arg("ESI No")
        .env("UAN_MARKER_PROFILE", profile_arg(temp.path()))
        .assert()
        .success()
        .stdout(predicate::str::contains("Total matches found: 1"))
        .stdout(predicate::str::contains("Not found: 3312345678"))
        .stdout(predicate::str::contains("Kept 2 of 3 pages"));

    let output_path = temp.path().join("esi-highlighted.pdf");
    assert!(output_path.exists(), "default output should sit next to the input");
    assert_eq!(page_texts(&output_path), vec!["ESI register", "3398765432 Ravi"]);
}

#[test]
fn no_match_keeps_only_first_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());
    let pdf = write_pdf(temp.path(), "uan.pdf", &["cover", "unrelated", "still unrelated"]);
    let output_path = temp.path().join("filtered.pdf");

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("mark")
        .arg(&pdf)
        .arg("--table")
        .arg(&table)
        .arg("--output")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total matches found: 0"))
        .stdout(predicate::str::contains("Found: (none)"));

    assert_eq!(page_texts(&output_path), vec!["cover"]);
}

#[test]
fn run_processes_both_registers() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());
    let uan = write_pdf(temp.path(), "uan.pdf", &["UAN register", "Asha 100200300400"]);
    let esi = write_pdf(temp.path(), "esi.pdf", &["ESI register", "3312345678", "none", "3398765432"]);
    let out_dir = temp.path().join("results");

    let output = cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("run")
        .arg("--table")
        .arg(&table)
        .arg("--uan-pdf")
        .arg(&uan)
        .arg("--esi-pdf")
        .arg(&esi)
        .arg("--out-dir")
        .arg(&out_dir)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["uan"]["report"]["total_matches"], 1);
    assert_eq!(value["uan"]["report"]["not_found"], serde_json::json!(["100200300777", "100200300999"]));
    assert_eq!(value["esi"]["report"]["kept_pages"], serde_json::json!([0, 1, 3]));
    assert_eq!(value["esi"]["column"], "ESI No");

    assert_eq!(page_texts(&out_dir.join("uan-highlighted.pdf")).len(), 2);
    assert_eq!(page_texts(&out_dir.join("esi-highlighted.pdf")), vec!["ESI register", "3312345678", "3398765432"]);
}

#[test]
fn missing_column_fails_before_opening_pdfs() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = temp.path().join("register.csv");
    fs::write(&table, format!("{PREAMBLE}Name,UAN No.\nAsha,100200300400\n")).expect("write");

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("run")
        .arg("--table")
        .arg(&table)
        .arg("--uan-pdf")
        .arg(temp.path().join("missing-uan.pdf"))
        .arg("--esi-pdf")
        .arg(temp.path().join("missing-esi.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("column \"ESI No\" not found"))
        .stderr(predicate::str::contains("file does not exist").not());
}

#[test]
fn malformed_identifier_aborts_when_requested() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = temp.path().join("register.csv");
    fs::write(&table, "UAN No.\n100200300400\nN/A\n").expect("write");
    let pdf = write_pdf(temp.path(), "uan.pdf", &["cover"]);

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("mark")
        .arg(&pdf)
        .arg("--table")
        .arg(&table)
        .arg("--skip-rows")
        .arg("0")
        .arg("--abort-on-malformed")
        .assert()
        .failure()
        .stderr(predicate::str::contains("row 3"))
        .stderr(predicate::str::contains("\"N/A\" is not a valid identifier"));

    assert!(!temp.path().join("uan-highlighted.pdf").exists());
}

#[test]
fn mark_fails_for_invalid_pdf_without_output() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());
    let pdf = temp.path().join("broken.pdf");
    fs::write(&pdf, b"%PDF-1.7\nthis is not really a pdf\n").expect("write");

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("mark")
        .arg(&pdf)
        .arg("--table")
        .arg(&table)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load PDF").or(predicate::str::contains("document has no pages")));

    assert!(!temp.path().join("broken-highlighted.pdf").exists());
}

#[test]
fn mark_fails_for_encrypted_pdf() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());
    let pdf = temp.path().join("locked.pdf");
    fs::write(&pdf, PdfFixture::text_pages(&["cover"]).encrypted().build()).expect("write");

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("mark")
        .arg(&pdf)
        .arg("--table")
        .arg(&table)
        .assert()
        .failure()
        .stderr(predicate::str::contains("encrypted PDFs are not supported"));
}

#[test]
fn mark_refuses_to_overwrite_input_spelled_differently() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());
    let pdf = write_pdf(temp.path(), "uan.pdf", &["cover", "100200300400"]);
    let original = fs::read(&pdf).expect("read");

    cargo_bin_cmd!("uan-marker")
        .current_dir(temp.path())
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("mark")
        .arg("uan.pdf")
        .arg("--table")
        .arg(&table)
        .arg("--output")
        .arg("./uan.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("output would overwrite the input PDF"));

    assert_eq!(fs::read(&pdf).expect("read"), original);
}

#[test]
fn mark_fails_for_missing_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("mark")
        .arg(temp.path().join("missing.pdf"))
        .arg("--table")
        .arg(&table)
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn columns_lists_headers_after_skipped_rows() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let table = write_register(temp.path());

    let output = cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(profile_arg(temp.path()))
        .arg("columns")
        .arg("--table")
        .arg(&table)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["headers"], serde_json::json!(["Name", "UAN No.", "ESI No"]));
}

#[test]
fn info_reports_page_count() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_pdf(temp.path(), "doc.pdf", &["a", "b", "c"]);

    let output = cargo_bin_cmd!("uan-marker")
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 3);
    assert!(value["first_page_size_pt"]["width"].as_f64().is_some());
}

#[test]
fn profile_set_show_and_reset() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let profile = profile_arg(temp.path());

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(&profile)
        .args(["profile", "set", "--skip-rows", "0", "--uan-column", "UAN", "--malformed", "abort"])
        .assert()
        .success();
    assert!(profile.exists());

    let output = cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(&profile)
        .args(["profile", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["skip_rows"], 0);
    assert_eq!(value["uan_column"], "UAN");
    assert_eq!(value["esi_column"], "ESI No");
    assert_eq!(value["malformed"], "abort");

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(&profile)
        .args(["profile", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("profile.json"));

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(&profile)
        .args(["profile", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));
    assert!(!profile.exists());
}

#[test]
fn stored_profile_drives_defaults() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let profile = profile_arg(temp.path());
    let table = temp.path().join("plain.csv");
    fs::write(&table, "Member,UAN\n,100200300400\n").expect("write");
    let pdf = write_pdf(temp.path(), "uan.pdf", &["cover", "UAN 100200300400"]);

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(&profile)
        .args(["profile", "set", "--skip-rows", "0", "--uan-column", "UAN"])
        .assert()
        .success();

    cargo_bin_cmd!("uan-marker")
        .arg("--profile")
        .arg(&profile)
        .arg("mark")
        .arg(&pdf)
        .arg("--table")
        .arg(&table)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total matches found: 1"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("uan-marker")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
