use notepad_gui::config::{
    ConfigFlags, CreationPolicy, OwnershipPolicy, WaitMode, load_config_flags, parse_flag_tokens,
};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".notepadrc");
    let content = r#"
# comment
--create never

--ownership if-created

--wait-ms=3000
"#;
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert_eq!(flags.create, Some(CreationPolicy::Never));
    assert_eq!(flags.ownership, Some(OwnershipPolicy::IfCreated));
    assert_eq!(flags.wait_ms, Some(3000));
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".notepadrc");
    let content = "--verbose\n--create always\n--wait poll\n";
    std::fs::write(&path, content).unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "notepad-gui".to_string(),
        "--create".to_string(),
        "if-not-found".to_string(),
        "--json".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args).unwrap();

    let effective = file_flags.union(&cli_flags);
    assert!(effective.verbose, "file flags should remain enabled");
    assert!(effective.json, "cli flags should be applied");
    assert_eq!(
        effective.create,
        Some(CreationPolicy::IfNotFound),
        "cli should override creation policy"
    );
    assert_eq!(
        effective.wait,
        Some(WaitMode::Poll),
        "file config should be preserved when CLI does not override"
    );
}

#[test]
fn test_malformed_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".notepadrc");
    std::fs::write(&path, "--create sometimes\n").unwrap();

    let err = load_config_flags(&path).unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("sometimes"), "error should name the bad value: {chain}");
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let flags = load_config_flags(&dir.path().join("absent")).unwrap();
    assert_eq!(flags, ConfigFlags::default());
}
