// End-to-end REPL scenario tests.
//
// Each test feeds a scripted session through the REPL and compares the full
// output, line by line, including prompt placement and the trailing prompt
// written before end of input.

use std::io::Cursor;

use rowlite::{repl, Table};
use tempfile::TempDir;

fn run_script(dir: &TempDir, commands: &[&str]) -> Vec<String> {
    let mut table = Table::open(dir.path().join("test.db")).unwrap();

    let input: String = commands.iter().map(|c| format!("{c}\n")).collect();
    let mut reader = Cursor::new(input.into_bytes());
    let mut output = Vec::new();
    repl::run(&mut table, &mut reader, &mut output).unwrap();

    String::from_utf8(output)
        .unwrap()
        .split('\n')
        .map(str::to_string)
        .collect()
}

#[test]
fn inserts_and_retrieves_a_row() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(
        &dir,
        &["insert 1 user1 person1@example.com", "select", ".exit"],
    );
    assert_eq!(
        result,
        vec![
            "db > Executed.",
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn allows_inserting_strings_of_max_length() {
    let dir = tempfile::tempdir().unwrap();
    let long_username = "a".repeat(32);
    let long_email = "a".repeat(255);
    let insert = format!("insert 1 {long_username} {long_email}");
    let result = run_script(&dir, &[&insert, "select", ".exit"]);
    assert_eq!(
        result,
        vec![
            "db > Executed.".to_string(),
            format!("db > (1, {long_username}, {long_email})"),
            "Executed.".to_string(),
            "db > ".to_string(),
        ]
    );
}

#[test]
fn prints_error_message_if_strings_are_too_long() {
    let dir = tempfile::tempdir().unwrap();
    let long_username = "a".repeat(33);
    let long_email = "a".repeat(256);
    let insert = format!("insert 1 {long_username} {long_email}");
    let result = run_script(&dir, &[&insert, "select", ".exit"]);
    assert_eq!(
        result,
        vec!["db > String is too long.", "db > Executed.", "db > "]
    );
}

#[test]
fn prints_error_message_if_id_is_negative() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(&dir, &["insert -1 cstack foo@bar.com", "select", ".exit"]);
    assert_eq!(
        result,
        vec!["db > ID must be positive.", "db > Executed.", "db > "]
    );
}

#[test]
fn keeps_data_after_closing_connection() {
    let dir = tempfile::tempdir().unwrap();

    let result1 = run_script(&dir, &["insert 1 user1 person1@example.com", ".exit"]);
    assert_eq!(result1, vec!["db > Executed.", "db > "]);

    let result2 = run_script(&dir, &["select", ".exit"]);
    assert_eq!(
        result2,
        vec![
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn prints_constants() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(&dir, &[".constants", ".exit"]);
    assert_eq!(
        result,
        vec![
            "db > Constants:",
            "ROW_SIZE: 293",
            "COMMON_NODE_HEADER_SIZE: 6",
            "LEAF_NODE_HEADER_SIZE: 10",
            "LEAF_NODE_CELL_SIZE: 297",
            "LEAF_NODE_SPACE_FOR_CELLS: 4086",
            "LEAF_NODE_MAX_CELLS: 13",
            "db > ",
        ]
    );
}

#[test]
fn prints_one_node_btree_structure() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(
        &dir,
        &[
            "insert 3 user3 person3@example.com",
            "insert 1 user1 person1@example.com",
            "insert 2 user2 person2@example.com",
            ".btree",
            ".exit",
        ],
    );
    assert_eq!(
        result,
        vec![
            "db > Executed.",
            "db > Executed.",
            "db > Executed.",
            "db > Tree:",
            "leaf (size 3)",
            "  - 0 : 1",
            "  - 1 : 2",
            "  - 2 : 3",
            "db > ",
        ]
    );
}

#[test]
fn prints_error_message_for_duplicate_id() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(
        &dir,
        &[
            "insert 1 user1 person1@example.com",
            "insert 1 user1 person1@example.com",
            "select",
            ".exit",
        ],
    );
    assert_eq!(
        result,
        vec![
            "db > Executed.",
            "db > Error: Duplicate key.",
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn select_lists_rows_in_ascending_id_order() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(
        &dir,
        &[
            "insert 3 user3 person3@example.com",
            "insert 1 user1 person1@example.com",
            "insert 2 user2 person2@example.com",
            "select",
            ".exit",
        ],
    );
    assert_eq!(
        result[3..],
        vec![
            "db > (1, user1, person1@example.com)",
            "(2, user2, person2@example.com)",
            "(3, user3, person3@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}

#[test]
fn select_spans_leaves_after_a_split() {
    let dir = tempfile::tempdir().unwrap();
    let mut commands: Vec<String> = (1..=20)
        .map(|i| format!("insert {i} user{i} person{i}@example.com"))
        .collect();
    commands.push("select".into());
    commands.push(".exit".into());
    let commands: Vec<&str> = commands.iter().map(String::as_str).collect();

    let result = run_script(&dir, &commands);

    let mut expected: Vec<String> = vec!["db > Executed.".into(); 20];
    expected.push("db > (1, user1, person1@example.com)".into());
    expected.extend((2..=20).map(|i| format!("({i}, user{i}, person{i}@example.com)")));
    expected.push("Executed.".into());
    expected.push("db > ".into());
    assert_eq!(result, expected);
}

#[test]
fn prints_structure_of_two_leaf_btree() {
    let dir = tempfile::tempdir().unwrap();
    let mut commands: Vec<String> = (1..=14)
        .map(|i| format!("insert {i} user{i} person{i}@example.com"))
        .collect();
    commands.push(".btree".into());
    commands.push(".exit".into());
    let commands: Vec<&str> = commands.iter().map(String::as_str).collect();

    let result = run_script(&dir, &commands);

    let mut expected: Vec<String> = vec!["db > Executed.".into(); 14];
    expected.push("db > Tree:".into());
    expected.push("- internal (size 1)".into());
    expected.push("  - key 7".into());
    expected.push("  leaf (size 7)".into());
    expected.extend((0..7).map(|i| format!("    - {i} : {}", i + 1)));
    expected.push("  leaf (size 7)".into());
    expected.extend((0..7).map(|i| format!("    - {i} : {}", i + 8)));
    expected.push("db > ".into());
    assert_eq!(result, expected);
}

#[test]
fn rejects_unrecognized_meta_command() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(&dir, &[".foo", ".exit"]);
    assert_eq!(result, vec!["db > Unrecognized command '.foo'.", "db > "]);
}

#[test]
fn rejects_unrecognized_keyword() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(&dir, &["frobnicate", ".exit"]);
    assert_eq!(
        result,
        vec![
            "db > Unrecognized keyword at start of 'frobnicate'.",
            "db > ",
        ]
    );
}

#[test]
fn rejects_malformed_insert() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_script(&dir, &["insert 1 user1", ".exit"]);
    assert_eq!(
        result,
        vec![
            "db > Syntax error. Could not parse statement.",
            "db > ",
        ]
    );
}

#[test]
fn end_of_input_closes_the_session_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    // No `.exit`: the script just ends.
    let result = run_script(&dir, &["insert 1 user1 person1@example.com"]);
    assert_eq!(result, vec!["db > Executed.", "db > "]);

    let result = run_script(&dir, &["select", ".exit"]);
    assert_eq!(
        result,
        vec![
            "db > (1, user1, person1@example.com)",
            "Executed.",
            "db > ",
        ]
    );
}
