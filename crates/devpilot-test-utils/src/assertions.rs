//! Assertion helpers for files, backups and diffs.

use std::path::Path;

use crate::fixtures::BACKUP_DIR;

/// Assert that a file's content equals expected text exactly.
pub fn assert_file_equals(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));

    if content != expected {
        panic!(
            "File {} content does not match.\n{}",
            path.display(),
            render_diff(expected, &content)
        );
    }
}

/// Assert that a file contains specific text.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));

    assert!(
        content.contains(expected),
        "File {} does not contain expected text.\nExpected to find: {}\nActual content:\n{}",
        path.display(),
        expected,
        content
    );
}

/// Assert that the backup of `rel` under `root` holds `expected`.
pub fn assert_backup_equals(root: &Path, rel: &str, expected: &str) {
    let backup = root.join(BACKUP_DIR).join(format!("{rel}.bak"));
    assert!(backup.exists(), "No backup for {rel} at {}", backup.display());
    assert_file_equals(&backup, expected);
}

/// Assert that no backup exists for `rel` under `root`.
pub fn assert_no_backup(root: &Path, rel: &str) {
    let backup = root.join(BACKUP_DIR).join(format!("{rel}.bak"));
    assert!(
        !backup.exists(),
        "Unexpected backup for {rel} at {}",
        backup.display()
    );
}

/// Assert that a unified diff removes and adds the given lines.
pub fn assert_diff_changes(diff: &str, removed: &[&str], added: &[&str]) {
    let lines: Vec<&str> = diff.lines().collect();
    for line in removed {
        let expected = format!("-{line}");
        assert!(
            lines.iter().any(|l| *l == expected),
            "Diff does not remove {line:?}:\n{diff}"
        );
    }
    for line in added {
        let expected = format!("+{line}");
        assert!(
            lines.iter().any(|l| *l == expected),
            "Diff does not add {line:?}:\n{diff}"
        );
    }
}

/// Assert that two strings are equal, with a line diff on failure.
pub fn assert_strings_equal(actual: &str, expected: &str) {
    if actual != expected {
        panic!("Strings are not equal.\n{}", render_diff(expected, actual));
    }
}

fn render_diff(expected: &str, actual: &str) -> String {
    let diff = similar::TextDiff::from_lines(expected, actual);
    let mut output = String::from("Diff (-expected +actual):\n");
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => "-",
            similar::ChangeTag::Insert => "+",
            similar::ChangeTag::Equal => " ",
        };
        output.push_str(sign);
        output.push_str(change.value());
        if change.missing_newline() {
            output.push('\n');
        }
    }
    output
}

/// Assert that a result is Ok and extract the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a result is Err and extract the error.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(value) => panic!("{}: {:?}", $msg, value),
            Err(e) => e,
        }
    };
}

/// Assert that a collection contains an item.
#[macro_export]
macro_rules! assert_contains {
    ($collection:expr, $item:expr) => {
        if !$collection.iter().any(|x| x == &$item) {
            panic!(
                "Collection does not contain expected item.\nExpected: {:?}\nCollection: {:?}",
                $item, $collection
            );
        }
    };
}
