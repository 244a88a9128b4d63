//! Tests for prefs and pool-demo.

use super::parse;
use crate::cli::{Cli, CliCommand, PrefsAction};
use clap::Parser;

#[test]
fn cli_parse_prefs_show_default_screen() {
    match parse(&["tkfdl", "prefs", "show"]) {
        CliCommand::Prefs { screen, action } => {
            assert_eq!(screen, "leakage");
            assert!(matches!(action, PrefsAction::Show));
        }
        _ => panic!("expected Prefs"),
    }
}

#[test]
fn cli_parse_prefs_set_url() {
    match parse(&[
        "tkfdl",
        "prefs",
        "--screen",
        "insulation",
        "set-url",
        "https://forms.example/a",
    ]) {
        CliCommand::Prefs { screen, action } => {
            assert_eq!(screen, "insulation");
            match action {
                PrefsAction::SetUrl { url } => assert_eq!(url, "https://forms.example/a"),
                _ => panic!("expected SetUrl"),
            }
        }
        _ => panic!("expected Prefs"),
    }
}

#[test]
fn cli_parse_prefs_set_width() {
    match parse(&["tkfdl", "prefs", "set-width", "TestPoint", "150px"]) {
        CliCommand::Prefs {
            action: PrefsAction::SetWidth { column, width },
            ..
        } => {
            assert_eq!(column, "TestPoint");
            assert_eq!(width, "150px");
        }
        _ => panic!("expected Prefs SetWidth"),
    }
}

#[test]
fn cli_parse_pool_demo() {
    match parse(&["tkfdl", "pool-demo"]) {
        CliCommand::PoolDemo { count } => assert_eq!(count, 5),
        _ => panic!("expected PoolDemo"),
    }
    match parse(&["tkfdl", "pool-demo", "--count", "12"]) {
        CliCommand::PoolDemo { count } => assert_eq!(count, 12),
        _ => panic!("expected PoolDemo"),
    }
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["tkfdl", "status"]).is_err());
}
