use figment::providers::Serialized;
use musicscan::config::{Config, ConfigError, RunSettings};
use musicscan::tools::Toolchain;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.bitrate_threshold_kbps, 256);
    assert_eq!(config.max_workers, None);
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("MUSICSCAN_LOW_BITRATE_SUBDIR", "too-small");
    // Use double underscore for nesting
    std::env::set_var("MUSICSCAN_REPAIR__FFMPEG", "true");

    use figment::{providers::Env, Figment};
    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("MUSICSCAN_").split("__"));

    let config: Config = figment.extract().unwrap();

    assert_eq!(config.low_bitrate_subdir, "too-small");
    assert!(config.repair.ffmpeg);

    std::env::remove_var("MUSICSCAN_LOW_BITRATE_SUBDIR");
    std::env::remove_var("MUSICSCAN_REPAIR__FFMPEG");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("musicscan.toml");

    let toml_content = r#"
max_workers = 6
bitrate_threshold_kbps = 192
fingerprint_max_length_secs = 120
unsorted_marker = ["Inbox"]
audio_extensions = ["mp3", "flac"]
quarantine_dir = "/srv/quarantine"

[repair]
mp3 = true
"#;
    fs::write(&config_path, toml_content).unwrap();

    use figment::{
        providers::{Format, Toml},
        Figment,
    };
    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));

    let config: Config = figment.extract().unwrap();

    assert_eq!(config.max_workers, Some(6));
    assert_eq!(config.bitrate_threshold_kbps, 192);
    assert_eq!(config.fingerprint_max_length_secs, 120);
    assert_eq!(config.unsorted_marker, vec!["Inbox"]);
    assert_eq!(config.audio_extensions, vec!["mp3", "flac"]);
    assert_eq!(config.quarantine_dir, Some(PathBuf::from("/srv/quarantine")));
    assert!(config.repair.mp3);
    assert!(!config.repair.ffmpeg);
    // Untouched keys keep their defaults
    assert_eq!(config.low_bitrate_subdir, "low-bitrate");
}

#[test]
fn test_explicit_file_overrides_user_file() {
    let temp_dir = tempdir().unwrap();
    let user = temp_dir.path().join("user.toml");
    let explicit = temp_dir.path().join("explicit.toml");
    fs::write(&user, "bitrate_threshold_kbps = 128\ndry_run = true\n").unwrap();
    fs::write(&explicit, "bitrate_threshold_kbps = 320\n").unwrap();

    let config: Config = Config::figment(Some(user.as_path()), Some(explicit.as_path()))
        .extract()
        .unwrap();

    assert_eq!(config.bitrate_threshold_kbps, 320);
    assert!(config.dry_run);
}

#[test]
fn test_config_invalid_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("broken.toml");
    fs::write(&config_path, "bitrate_threshold_kbps = \"loud\"\n").unwrap();

    let result = Config::load(Some(config_path.as_path()));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_config_missing_explicit_file() {
    let temp_dir = tempdir().unwrap();
    let result = Config::load(Some(temp_dir.path().join("nope.toml").as_path()));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_run_settings_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("musicscan.toml");
    fs::write(
        &config_path,
        "unsorted_marker = [\"Inbox\", \"New\"]\nlow_bitrate_subdir = \"lofi\"\n",
    )
    .unwrap();

    use figment::providers::{Format, Toml};
    let config: Config = figment::Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&config_path))
        .extract()
        .unwrap();
    let settings = RunSettings::resolve(config, PathBuf::from("/library"), Toolchain::none());

    assert_eq!(
        settings.low_bitrate_dir,
        PathBuf::from("/library/Deletions/lofi")
    );
    assert!(settings
        .unsorted_marker
        .matches(std::path::Path::new("/library/inbox/new/a.mp3")));
}
