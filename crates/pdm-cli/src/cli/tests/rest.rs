//! Tests for status, pause, resume, remove, set, checksum and id matching.

use super::parse;
use crate::cli::{match_id, CliCommand};
use uuid::Uuid;

#[test]
fn cli_parse_status() {
    match parse(&["pdm", "status"]) {
        CliCommand::Status { json } => assert!(!json),
        _ => panic!("expected Status"),
    }
    match parse(&["pdm", "status", "--json"]) {
        CliCommand::Status { json } => assert!(json),
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_pause_resume() {
    match parse(&["pdm", "pause", "abc"]) {
        CliCommand::Pause { id } => assert_eq!(id, "abc"),
        _ => panic!("expected Pause"),
    }
    match parse(&["pdm", "resume", "abc"]) {
        CliCommand::Resume { id } => assert_eq!(id, "abc"),
        _ => panic!("expected Resume"),
    }
}

#[test]
fn cli_parse_remove() {
    match parse(&["pdm", "remove", "abc", "--delete-file"]) {
        CliCommand::Remove { id, delete_file } => {
            assert_eq!(id, "abc");
            assert!(delete_file);
        }
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_set() {
    match parse(&[
        "pdm",
        "set",
        "abc",
        "--name",
        "new.iso",
        "--retry",
        "false",
        "--replace",
    ]) {
        CliCommand::Set(args) => {
            assert!(args.replace);
            let params = args.to_params();
            assert_eq!(params.file_name.as_deref(), Some("new.iso"));
            assert_eq!(params.retry, Some(false));
            assert!(params.url.is_none());
        }
        _ => panic!("expected Set"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["pdm", "checksum", "/tmp/f", "--expect", "abcd"]) {
        CliCommand::Checksum { path, expect } => {
            assert_eq!(path, std::path::PathBuf::from("/tmp/f"));
            assert_eq!(expect.as_deref(), Some("abcd"));
        }
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn id_prefix_matching() {
    let a = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000001").unwrap();
    let b = Uuid::parse_str("1a2b9999-0000-4000-8000-000000000002").unwrap();
    let known = [a, b];
    assert_eq!(match_id(&known, "1a2b3").unwrap(), a);
    assert_eq!(match_id(&known, &b.to_string()).unwrap(), b);
    assert!(match_id(&known, "1a2b").is_err());
    assert!(match_id(&known, "ffff").is_err());
    assert!(match_id(&known, "").is_err());
}
