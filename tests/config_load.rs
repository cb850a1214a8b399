// tests/config_load.rs
// Mutates process env and CWD, so every test is serialized.

use std::{env, fs};

use feedback_sentiment_hub::config::{AppConfig, ClassifierProvider, ENV_CONFIG_PATH};

const VARS: &[&str] = &[
    ENV_CONFIG_PATH,
    "DATABASE_URL",
    "CLASSIFIER_PROVIDER",
    "AZURE_LANGUAGE_ENDPOINT",
    "AZURE_LANGUAGE_KEY",
    "RECENT_MAX",
];

/// Small RAII helper to snapshot & restore env vars + CWD in each test.
struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
    cwd: std::path::PathBuf,
    _tmp: tempfile::TempDir,
}

impl EnvSnapshot {
    /// Clear known vars and move into an empty temp dir.
    fn isolated() -> Self {
        let saved = VARS
            .iter()
            .map(|k| (k.to_string(), env::var(k).ok()))
            .collect();
        for k in VARS {
            env::remove_var(k);
        }
        let cwd = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        Self {
            saved,
            cwd,
            _tmp: tmp,
        }
    }

    fn dir(&self) -> &std::path::Path {
        self._tmp.path()
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.cwd);
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(val) => env::set_var(&k, val),
                None => env::remove_var(&k),
            }
        }
    }
}

#[serial_test::serial]
#[test]
fn missing_azure_credentials_fail_startup() {
    let _env = EnvSnapshot::isolated();
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("endpoint"), "{err}");

    env::set_var("AZURE_LANGUAGE_ENDPOINT", "https://lang.example");
    let err = AppConfig::load().unwrap_err();
    assert!(err.to_string().contains("API key"), "{err}");

    env::set_var("AZURE_LANGUAGE_KEY", "secret");
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.classifier.provider, ClassifierProvider::Azure);
    assert_eq!(cfg.classifier.api_key.as_deref(), Some("secret"));
}

#[serial_test::serial]
#[test]
fn lexicon_provider_starts_without_credentials() {
    let _env = EnvSnapshot::isolated();
    env::set_var("CLASSIFIER_PROVIDER", "lexicon");
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.classifier.provider, ClassifierProvider::Lexicon);
    assert_eq!(cfg.recent_default, 50);
}

#[serial_test::serial]
#[test]
fn default_file_then_env_override() {
    let env_guard = EnvSnapshot::isolated();

    let cfg_dir = env_guard.dir().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("feedback.toml"),
        r#"
database_url = "sqlite://from-file.db"
recent_max = 100

[classifier]
provider = "azure"
endpoint = "https://lang.example"
api_key = "ENV"
"#,
    )
    .unwrap();

    // "ENV" placeholder requires the variable.
    assert!(AppConfig::load().is_err());

    env::set_var("AZURE_LANGUAGE_KEY", "from-env");
    env::set_var("RECENT_MAX", "10");
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.database_url, "sqlite://from-file.db");
    assert_eq!(cfg.classifier.api_key.as_deref(), Some("from-env"));
    assert_eq!(cfg.recent_max, 10);
    assert_eq!(cfg.recent_default, 10);
}

#[serial_test::serial]
#[test]
fn explicit_config_path_must_exist() {
    let env_guard = EnvSnapshot::isolated();
    env::set_var(ENV_CONFIG_PATH, env_guard.dir().join("nope.toml"));
    assert!(AppConfig::load().is_err());

    let p = env_guard.dir().join("custom.toml");
    fs::write(&p, "[classifier]\nprovider = \"lexicon\"\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, &p);
    assert_eq!(
        AppConfig::load().unwrap().classifier.provider,
        ClassifierProvider::Lexicon
    );
}
