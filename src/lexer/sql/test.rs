use fallible_iterator::FallibleIterator;
use std::sync::mpsc;
use std::time::Duration;

use super::{split_statements, Error, Splitter, Statements};
use crate::buffer::SharedBuffer;
use crate::lexer::Scanner;

const WAIT: Duration = Duration::from_millis(1);

fn split(sql: &str) -> Vec<String> {
    let buffer = SharedBuffer::from_text(sql);
    Statements::new(&buffer, WAIT).collect().unwrap()
}

#[test]
fn two_statements() {
    assert_eq!(
        vec!["SET x = 1;", "SELECT 'a';"],
        split("SET x = 1;\nSELECT 'a';\n")
    );
}

#[test]
fn no_trailing_semicolon() {
    assert_eq!(vec!["SELECT 1"], split("SELECT 1"));
    assert_eq!(vec!["SELECT 1;", "SELECT 2"], split("SELECT 1;\n  SELECT 2 \n\n"));
}

#[test]
fn empty_input() {
    assert!(split("").is_empty());
    assert!(split(" \n\t\n").is_empty());
    assert!(split(";;\n;").is_empty());
}

#[test]
fn doubled_quotes() {
    assert_eq!(vec!["SELECT 'a''b';"], split("SELECT 'a''b';"));
    assert_eq!(vec!["SELECT '';", "SELECT 1;"], split("SELECT '';SELECT 1;"));
    assert_eq!(
        vec!["SELECT 'a;b', ';';", "SELECT 2;"],
        split("SELECT 'a;b', ';'; SELECT 2;")
    );
}

#[test]
fn comment_with_multiple_quotes() {
    let sql = "\
COMMENT ON COLUMN public.office_emails.label IS 'The department the email gets sent to. For example, ''Customer Service''';
COMMENT ON COLUMN public.office_emails.updated_at IS '''triple quotes at start';
COMMENT ON COLUMN public.office_emails.created_at IS 'Lots of quotes ''''within a string.''''';
COMMENT ON COLUMN public.office_emails.updated_at IS 'Unbalanced quotes at end of string''';
COMMENT ON COLUMN public.office_emails.updated_at IS 'normal quotes at start';
";
    let expected: Vec<&str> = sql.lines().collect();
    assert_eq!(expected, split(sql));
}

#[test]
fn do_block() {
    let sql = "DO $do$\nBEGIN\nPERFORM 1;\nPERFORM 2;\nEND $do$;\nSELECT 3;";
    assert_eq!(
        vec!["DO $do$\nBEGIN\nPERFORM 1;\nPERFORM 2;\nEND $do$;", "SELECT 3;"],
        split(sql)
    );
}

#[test]
fn do_block_case_insensitive() {
    let sql = "do   $Body$ BEGIN PERFORM 1; END $BODY$;";
    assert_eq!(vec!["do $Body$\nBEGIN PERFORM 1; END $Body$;"], split(sql));
}

#[test]
fn function_body() {
    let sql = "\
CREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$
BEGIN
  NEW.updated_at = now();
  RETURN NEW;
END;
$$ LANGUAGE plpgsql;
CREATE TRIGGER t BEFORE UPDATE ON users FOR EACH ROW EXECUTE PROCEDURE touch();
";
    let stmts = split(sql);
    assert_eq!(2, stmts.len());
    assert!(stmts[0].starts_with("CREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$\n"));
    assert!(stmts[0].ends_with("END;\n$$ LANGUAGE plpgsql;"));
    assert!(stmts[1].starts_with("CREATE TRIGGER"));
}

#[test]
fn as_outside_function() {
    // only function definitions open a block on AS
    assert_eq!(
        vec!["SELECT 1 AS one;", "SELECT 2;"],
        split("SELECT 1 AS one; SELECT 2;")
    );
}

#[test]
fn keyword_must_follow_whitespace() {
    assert_eq!(vec!["SELECT undo x;", "SELECT 1;"], split("SELECT undo x; SELECT 1;"));
}

#[test]
fn nested_do_in_block() {
    let sql = "\
DO $do$
BEGIN
INSERT INTO t (a) VALUES (1) ON CONFLICT (a) DO UPDATE
SET a = 2;
UPDATE t SET a = 3;
END $do$;
SELECT 1;";
    let stmts = split(sql);
    assert_eq!(2, stmts.len());
    assert!(stmts[0].contains("DO UPDATE\nSET a = 2;"));
    assert!(stmts[0].ends_with("END $do$;"));
    assert_eq!("SELECT 1;", stmts[1]);
}

#[test]
fn copy_from_stdin() {
    let sql = "\
SET client_encoding = 'UTF8';
COPY public.users (id, email, created_at) FROM stdin;
1\t\\N\texample@example.com\t\t
2\tO'Connell; x\t2021-05-12
\\.
SELECT 1;
";
    assert_eq!(
        vec![
            "SET client_encoding = 'UTF8';",
            "COPY public.users (id, email, created_at) FROM stdin;",
            "1\t\\N\texample@example.com\t\t",
            "2\tO'Connell; x\t2021-05-12",
            "SELECT 1;",
        ],
        split(sql)
    );
}

#[test]
fn copy_after_blank_lines() {
    let sql = "COPY t (a, b) FROM stdin;\n\n \t\n\t2\n1\t2\n\\.\nSELECT 1;";
    assert_eq!(
        vec!["COPY t (a, b) FROM stdin;", "\t2", "1\t2", "SELECT 1;"],
        split(sql)
    );
}

#[test]
fn copy_without_terminator() {
    let sql = "COPY t (a) FROM stdin;\n1\n2";
    assert_eq!(vec!["COPY t (a) FROM stdin;", "1", "2"], split(sql));
}

#[test]
fn resplit_is_idempotent() {
    let sql = "\
SET x = 1;
SELECT 'a''b;c';
DO $do$ BEGIN PERFORM 1; END $do$;
CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql;
SELECT 2";
    let first = split(sql);
    let second = split(&first.join("\n"));
    assert_eq!(first, second);
}

#[test]
fn statement_lines() {
    let buffer = SharedBuffer::from_text("SELECT 1;\n\n  SELECT\n2;");
    let mut scanner = Scanner::new(&buffer, WAIT);
    let mut splitter = Splitter::new();
    let first = splitter.next_statement(&mut scanner).unwrap().unwrap();
    assert_eq!(1, first.line);
    let second = splitter.next_statement(&mut scanner).unwrap().unwrap();
    assert_eq!("SELECT\n2;", second.text);
    assert_eq!(3, second.line);
    assert_eq!(None, splitter.next_statement(&mut scanner).unwrap());
    assert_eq!(None, splitter.next_statement(&mut scanner).unwrap());
}

#[test]
fn unterminated_literal_is_flushed() {
    assert_eq!(vec!["SELECT 'oops;"], split("SELECT 'oops;\n"));
}

#[test]
fn split_into_channel() {
    let buffer = SharedBuffer::from_text("SELECT 1; SELECT 2;");
    let (tx, rx) = mpsc::channel();
    assert_eq!(2, split_statements(&buffer, tx, WAIT).unwrap());
    let received: Vec<String> = rx.iter().collect();
    assert_eq!(vec!["SELECT 1;", "SELECT 2;"], received);
}

#[test]
fn split_into_closed_channel() {
    let buffer = SharedBuffer::from_text("SELECT 1;");
    let (tx, rx) = mpsc::channel();
    drop(rx);
    assert!(matches!(
        split_statements(&buffer, tx, WAIT),
        Err(Error::Disconnected)
    ));
}

#[test]
fn split_reports_writer_failure() {
    let buffer = SharedBuffer::new();
    buffer.write("SELECT 1; SELECT").unwrap();
    buffer.fail(&std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"));
    let (tx, rx) = mpsc::channel();
    let result = split_statements(&buffer, tx, WAIT);
    assert!(matches!(result, Err(Error::Io(_))));
    // queue is closed after the statements sent before the failure
    assert_eq!(vec!["SELECT 1;".to_owned()], rx.iter().collect::<Vec<_>>());
}
