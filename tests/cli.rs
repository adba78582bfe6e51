//! Command-line parsing and settings resolution, end to end from argv.

use std::path::PathBuf;

use clap::Parser;
use copy_core::TableName;
use table_sync::{run_copy, Cli, RunSettings};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("table-sync").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_short_flags() {
    let cli = parse(&[
        "-G", "db1", "-U", "reader", "-W", "pw", "-D", "prod", "-I", "db2", "-u", "writer", "-w",
        "pw2", "-d", "mirror", "-s", "copier", "-t", "orders", "-T", "orders", "-m", "/tmp/dumps",
        "-v", "-V", "10", "-F", "-n", "-p", "4", "-g",
    ]);

    assert_eq!(cli.source_host.as_deref(), Some("db1"));
    assert_eq!(cli.source_user.as_deref(), Some("reader"));
    assert_eq!(cli.source_password.as_deref(), Some("pw"));
    assert_eq!(cli.source_database.as_deref(), Some("prod"));
    assert_eq!(cli.target_host.as_deref(), Some("db2"));
    assert_eq!(cli.target_user.as_deref(), Some("writer"));
    assert_eq!(cli.target_password.as_deref(), Some("pw2"));
    assert_eq!(cli.target_database.as_deref(), Some("mirror"));
    assert_eq!(cli.transfer_user.as_deref(), Some("copier"));
    assert_eq!(cli.tables, Some(vec!["orders".to_string()]));
    assert_eq!(cli.skip_verification, Some(vec!["orders".to_string()]));
    assert_eq!(cli.dump_dir, Some(PathBuf::from("/tmp/dumps")));
    assert!(cli.verbose);
    assert_eq!(cli.verify_threshold, Some(10));
    assert!(cli.force_full);
    assert!(cli.no_last_mod_check);
    assert_eq!(cli.workers, Some(4));
    assert!(cli.debug);
}

#[test]
fn test_several_table_values() {
    let cli = parse(&["-t", "orders", "customers", "-v"]);
    assert_eq!(
        cli.tables,
        Some(vec!["orders".to_string(), "customers".to_string()])
    );
    assert!(cli.verbose);
}

#[test]
fn test_invalid_numbers_are_rejected() {
    assert!(Cli::try_parse_from(["table-sync", "-V", "many"]).is_err());
    assert!(Cli::try_parse_from(["table-sync", "-p", "-1"]).is_err());
}

#[test]
fn test_config_file_and_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table-sync.toml");
    std::fs::write(
        &path,
        r#"
        [source]
        host = "db1"
        database = "prod"

        [target]
        database = "mirror"

        [copy]
        tables = ["orders", "customers"]
        force_full = true
        batch_size = 500
        "#,
    )
    .unwrap();

    let cli = parse(&["-f", path.to_str().unwrap(), "-d", "scratch"]);
    let settings = RunSettings::from_cli(&cli).unwrap();

    assert_eq!(settings.source.host, "db1");
    assert_eq!(settings.source.database, "prod");
    assert_eq!(settings.target.database, "scratch");
    assert_eq!(
        settings.tables,
        vec![TableName::new("orders"), TableName::new("customers")]
    );
    assert!(settings.options.force_full);
    assert_eq!(settings.options.batch_size, 500);
}

#[test]
fn test_missing_config_file() {
    let cli = parse(&["-f", "/nonexistent/table-sync.toml", "-t", "orders"]);
    let err = RunSettings::from_cli(&cli).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read config file"));
}

#[test]
fn test_unusable_dump_dir_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let cli = parse(&[
        "-t",
        "orders",
        "-m",
        blocker.to_str().unwrap(),
        "-G",
        "unreachable.invalid",
    ]);
    let settings = RunSettings::from_cli(&cli).unwrap();

    let err = tokio_test::block_on(run_copy(&settings)).unwrap_err();
    assert!(format!("{err:#}").contains("writable dump dir"));
}
