use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn gramterp(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gramterp"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(args)
        .output()
        .expect("Failed to run gramterp")
}

fn grammar_for(source_file: &Path) -> Option<&'static str> {
    match source_file.extension().and_then(|s| s.to_str()) {
        Some("pas") => Some("grammars/pascal.json"),
        Some("led") => Some("grammars/led.json"),
        _ => None,
    }
}

/// Runs `source_file` and compares everything it hands to the host with the corresponding
/// `.expected` file. Extra command line arguments are read from an optional `.args` file.
fn test_program(source_file: &Path, grammar: &str) {
    let expected_output_file = source_file.with_extension("expected");
    let expected_output = fs::read_to_string(&expected_output_file).unwrap_or_else(|_| {
        panic!(
            "Failed to read expected output file {}",
            expected_output_file.display()
        )
    });
    let extra_args = fs::read_to_string(source_file.with_extension("args")).unwrap_or_default();

    let source = source_file.to_str().unwrap();
    let mut args = vec!["run", grammar, source];
    args.extend(extra_args.split_whitespace());

    let output = gramterp(&args);
    assert!(
        output.status.success(),
        "{source} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        expected_output.trim(),
        "Test failed for: {:?}",
        source_file
    );
}

#[test]
fn test_all_programs() {
    let test_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/programs");

    let mut count = 0;
    for entry in fs::read_dir(&test_dir).expect("Failed to read test directory") {
        let path = entry.expect("Failed to read directory entry").path();
        if let Some(grammar) = grammar_for(&path) {
            test_program(&path, grammar);
            count += 1;
        }
    }
    assert_eq!(count, 4);
}

#[test]
fn test_runtime_error_is_reported() {
    let dir = std::env::temp_dir().join(format!("gramterp-error-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let source = dir.join("broken.pas");
    fs::write(&source, "PROGRAM broken; BEGIN print(1); print(1 DIV 0) END.").unwrap();

    let output = gramterp(&["run", "grammars/pascal.json", source.to_str().unwrap()]);
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "call print(1)");
    assert!(String::from_utf8_lossy(&output.stderr).contains("division by zero"));
}

#[test]
fn test_entry_point_runs_one_handler() {
    let output = gramterp(&[
        "run",
        "grammars/led.json",
        "tests/programs/chase.led",
        "--entry",
        "frame",
    ]);

    // position was never set, so reading it fails
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no external named 'position'"));
}
