use pm_domain::config::{Config, ConfigSeverity};

#[test]
fn empty_file_yields_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    assert_eq!(config.agent.max_tool_iterations, 10);
    assert_eq!(config.context.conversation_max_chars, 12_000);
    assert_eq!(config.context.read_file_max_lines, 500);
    assert_eq!(config.context.search_max_matches, 100);
    assert_eq!(config.context.search_text_max_chars, 200);
    assert_eq!(config.store.table, "tickets");
    assert!(config.store.base_url.is_none());
    assert!(!config.github.connected);
}

#[test]
fn project_paths_resolve_under_root() {
    let toml_str = r#"
[project]
root = "/srv/hal"
repo_full_name = "acme/hal-portal"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(
        config.project.rules_path(),
        std::path::PathBuf::from("/srv/hal/.cursor/rules")
    );
    assert_eq!(
        config.project.template_path(),
        std::path::PathBuf::from("/srv/hal/docs/templates/ticket.template.md")
    );
    assert_eq!(
        config.project.checklist_path(),
        std::path::PathBuf::from("/srv/hal/docs/process/ready-to-start-checklist.md")
    );
}

#[test]
fn store_auth_defaults_to_anon_key_env() {
    let config = Config::default();
    assert_eq!(config.store.auth.env.as_deref(), Some("SUPABASE_ANON_KEY"));
    assert_eq!(config.github.auth.env.as_deref(), Some("GITHUB_TOKEN"));
}

#[test]
fn github_repo_falls_back_to_project_repo() {
    let toml_str = r#"
[project]
repo_full_name = "acme/hal-portal"

[github]
connected = true
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.github_repo(), Some("acme/hal-portal"));
}

#[test]
fn default_config_only_warns_about_missing_store() {
    let issues = Config::default().validate();
    assert!(issues.iter().all(|e| e.severity == ConfigSeverity::Warning));
    assert!(issues.iter().any(|e| e.field == "store.base_url"));
}

#[test]
fn zero_iterations_is_an_error() {
    let config: Config = toml::from_str("[agent]\nmax_tool_iterations = 0\n").unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "agent.max_tool_iterations" && e.severity == ConfigSeverity::Error));
}

#[test]
fn zero_output_caps_are_errors() {
    let config: Config =
        toml::from_str("[context]\nread_file_max_lines = 0\nsearch_max_matches = 0\n").unwrap();
    let fields: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .map(|e| e.field)
        .collect();
    assert!(fields.iter().any(|f| f == "context.read_file_max_lines"));
    assert!(fields.iter().any(|f| f == "context.search_max_matches"));
    assert!(!fields.iter().any(|f| f == "context.search_text_max_chars"));
}

#[test]
fn malformed_repo_reference_is_an_error() {
    let config: Config = toml::from_str("[project]\nrepo_full_name = \"hal-portal\"\n").unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "project.repo_full_name" && e.severity == ConfigSeverity::Error));
}

#[test]
fn connected_without_repo_warns() {
    let config: Config = toml::from_str("[github]\nconnected = true\n").unwrap();
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "github.repo_full_name" && e.severity == ConfigSeverity::Warning));
}

#[test]
fn config_error_display_is_tagged() {
    let config: Config = toml::from_str("[store]\ntable = \"\"\n").unwrap();
    let rendered: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
    assert!(rendered
        .iter()
        .any(|s| s == "[ERROR] store.table: table must not be empty"));
}
