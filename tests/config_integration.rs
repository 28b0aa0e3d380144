use richnote::config::{
    ConfigFlags, SessionConfig, load_config_flags, parse_flag_tokens, save_config_flags,
};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".richnoterc");
    let content = r"
# comment
--watch

--debounce-ms 250

--content-field=Body
--placeholder Nothing here yet
";
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.watch);
    assert_eq!(flags.debounce_ms, Some(250));
    assert_eq!(flags.content_field.as_deref(), Some("Body"));
    assert_eq!(flags.placeholder.as_deref(), Some("Nothing here yet"));
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".richnoterc");
    let content = "--watch\n--debounce-ms 250\n--attachment-field Images\n";
    std::fs::write(&path, content).unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "richnote".to_string(),
        "--debounce-ms".to_string(),
        "1000".to_string(),
        "--verbose".to_string(),
        "edit".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.watch, "file flags should remain enabled");
    assert!(effective.verbose, "cli flags should be applied");
    assert_eq!(effective.debounce_ms, Some(1000), "cli should override delay");
    assert_eq!(
        effective.attachment_field.as_deref(),
        Some("Images"),
        "file config should be preserved when CLI does not override"
    );
}

#[test]
fn test_parse_flag_tokens_handles_equals_syntax() {
    let args = vec![
        "richnote".to_string(),
        "--image-width=640".to_string(),
        "--script-url=https://cdn/editor.js".to_string(),
    ];
    let flags = parse_flag_tokens(&args);
    assert_eq!(flags.image_width, Some(640));
    assert_eq!(flags.script_url.as_deref(), Some("https://cdn/editor.js"));
}

#[test]
fn test_saved_flags_resolve_to_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config");
    let flags = ConfigFlags {
        debounce_ms: Some(50),
        image_width: Some(320),
        ..ConfigFlags::default()
    };
    save_config_flags(&path, &flags).unwrap();

    let settings = load_config_flags(&path).unwrap().settings();
    assert_eq!(
        settings,
        SessionConfig {
            debounce_ms: 50,
            image_width: 320,
            ..SessionConfig::default()
        }
    );
}
