//! Tests for add and run subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_add() {
    match parse(&["pdm", "add", "https://example.com/file.iso"]) {
        CliCommand::Add(args) => {
            assert_eq!(args.url, "https://example.com/file.iso");
            assert!(args.dir.is_none());
            assert!(args.pieces.is_none());
            assert!(!args.probe);
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_options() {
    match parse(&[
        "pdm",
        "add",
        "https://example.com/x",
        "--dir",
        "/tmp",
        "--pieces",
        "8",
        "-H",
        "Referer: https://example.com/",
        "--header",
        "Cookie: a=b",
        "--unmetered-only",
        "--probe",
    ]) {
        CliCommand::Add(args) => {
            assert_eq!(args.dir.as_deref(), Some(std::path::Path::new("/tmp")));
            assert_eq!(args.pieces, Some(8));
            assert_eq!(args.headers.len(), 2);
            assert!(args.unmetered_only);
            assert!(args.probe);
        }
        _ => panic!("expected Add with options"),
    }
}

#[test]
fn cli_rejects_piece_count_out_of_range() {
    assert!(Cli::try_parse_from(["pdm", "add", "https://h/x", "--pieces", "0"]).is_err());
    assert!(Cli::try_parse_from(["pdm", "add", "https://h/x", "--pieces", "257"]).is_err());
}

#[test]
fn cli_parse_run() {
    match parse(&["pdm", "run"]) {
        CliCommand::Run { ids } => assert!(ids.is_empty()),
        _ => panic!("expected Run"),
    }
    match parse(&["pdm", "run", "1a2b", "3c4d"]) {
        CliCommand::Run { ids } => assert_eq!(ids, vec!["1a2b", "3c4d"]),
        _ => panic!("expected Run with ids"),
    }
}
