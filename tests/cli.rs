use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn rect_svg(w: f64, h: f64) -> String {
    format!("<svg><rect x=\"0\" y=\"0\" width=\"{w}\" height=\"{h}\"/></svg>")
}

#[test]
fn cli_nests_two_squares_onto_one_sheet() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let sheet = tmp.child("sheet.svg");
    sheet.write_str(&rect_svg(20.0, 20.0))?;
    let part = tmp.child("part.svg");
    part.write_str(&rect_svg(5.0, 5.0))?;

    Command::cargo_bin("deepnest_cli")?
        .current_dir(&tmp)
        .args([
            "--inputs",
            sheet.path().to_str().unwrap(),
            part.path().to_str().unwrap(),
            "--population-size",
            "2",
            "--rotations",
            "1",
            "--generations",
            "2",
            "--spacing",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nested result written"));

    let output = std::fs::read_to_string(tmp.path().join("nested.svg"))?;
    assert!(output.contains("<svg"));
    assert!(output.contains("polygon"));
    tmp.close()?;
    Ok(())
}

#[test]
fn cli_dump_config_prints_json_without_nesting() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let sheet = tmp.child("sheet.svg");
    sheet.write_str(&rect_svg(10.0, 10.0))?;
    let part = tmp.child("part.svg");
    part.write_str(&rect_svg(2.0, 2.0))?;

    Command::cargo_bin("deepnest_cli")?
        .current_dir(&tmp)
        .args([
            "--inputs",
            sheet.path().to_str().unwrap(),
            part.path().to_str().unwrap(),
            "--dump-config",
            "--spacing",
            "3.5",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"spacing\": 3.5"));

    assert!(!tmp.path().join("nested.svg").exists());
    tmp.close()?;
    Ok(())
}

#[test]
fn cli_config_file_is_overlaid_by_flags() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let config = tmp.child("config.json");
    config.write_str(r#"{"spacing":1.0,"curve_tolerance":0.3,"clipper_scale":10000000.0,"rotations":4,"population_size":10,"mutation_rate":10,"threads":2,"placement_type":"gravity","merge_lines":false,"time_ratio":0.5,"simplify":false,"use_holes":true}"#)?;

    Command::cargo_bin("deepnest_cli")?
        .current_dir(&tmp)
        .args([
            "--inputs",
            "unused-sheet.svg",
            "--config",
            config.path().to_str().unwrap(),
            "--dump-config",
            "--rotations",
            "8",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rotations\": 8"))
        .stdout(predicate::str::contains("\"spacing\": 1.0"));

    tmp.close()?;
    Ok(())
}

#[test]
fn cli_use_holes_flag_can_disable_a_config_that_enabled_it() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    let config = tmp.child("config.json");
    config.write_str(r#"{"spacing":1.0,"curve_tolerance":0.3,"clipper_scale":10000000.0,"rotations":4,"population_size":10,"mutation_rate":10,"threads":2,"placement_type":"gravity","merge_lines":false,"time_ratio":0.5,"simplify":false,"use_holes":true}"#)?;

    Command::cargo_bin("deepnest_cli")?
        .current_dir(&tmp)
        .args([
            "--inputs",
            "unused-sheet.svg",
            "--config",
            config.path().to_str().unwrap(),
            "--dump-config",
            "--use-holes",
            "false",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"use_holes\": false"));

    tmp.close()?;
    Ok(())
}

#[test]
fn cli_rejects_missing_sheet_file() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = TempDir::new()?;
    Command::cargo_bin("deepnest_cli")?
        .current_dir(&tmp)
        .args(["--inputs", "does-not-exist.svg", "also-missing.svg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed to parse sheet"));
    tmp.close()?;
    Ok(())
}
