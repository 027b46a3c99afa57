use std::fs;

use pitonflow_chipset::*;

#[test]
fn every_profile_comes_up() {
    for profile in BoardProfile::ALL {
        let mut system = System::new(profile.config(), 1).unwrap();
        assert!(system.run_until_ready(1_000), "{} did not come up", profile.name());
    }
}

#[test]
fn invalid_configs_are_rejected() {
    let config = ChipsetConfig::genesys2().with_threshold(9);
    assert!(matches!(System::new(config, 0), Err(ConfigError::ThresholdExceedsDepth { threshold: 9, depth: 8 })));

    let mut config = ChipsetConfig::genesys2();
    config.chip.buffer_depth[1] = 4;
    config.chip.send_credit_threshold = 4;
    config.chipset.send_credit_threshold = 4;
    assert!(matches!(System::new(config, 0), Err(ConfigError::DepthMismatch { local: 4, remote: 8, .. })));

    let mut config = ChipsetConfig::vcu118();
    config.chipset.sync_stages = 3;
    assert!(matches!(System::new(config, 0), Err(ConfigError::SyncStagesMismatch { local: 2, remote: 3 })));

    let mut config = ChipsetConfig::piton_board();
    config.chip.crossing_depth = 16;
    assert!(matches!(System::new(config, 0), Err(ConfigError::CrossingTooShallow { depth: 16, required: 27 })));

    let mut config = ChipsetConfig::vc707();
    config.clock.link_period_ps = 0;
    assert!(matches!(System::new(config, 0), Err(ConfigError::ZeroPeriod { .. })));

    let mut config = ChipsetConfig::vc707();
    config.link.bit_error_rate = 1.5;
    assert!(matches!(System::new(config, 0), Err(ConfigError::BitErrorRate { .. })));
}

#[test]
fn file_overlays_its_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.toml");
    fs::write(
        &path,
        r#"
profile = "vc707"

[chip]
send_credit_threshold = 3

[chipset]
send_credit_threshold = 3

[link]
latency = 6
"#,
    )
    .unwrap();

    let config = ChipsetConfig::load(Some(&path)).unwrap();
    let base = ChipsetConfig::vc707();
    assert_eq!(config.profile, BoardProfile::Vc707);
    assert_eq!(config.chip.send_credit_threshold, 3);
    assert_eq!(config.chipset.send_credit_threshold, 3);
    assert_eq!(config.chip.buffer_depth, base.chip.buffer_depth);
    assert_eq!(config.link.latency, 6);
    assert_eq!(config.reset, base.reset);
    assert_eq!(config.clock, base.clock);
}

#[test]
fn file_errors() {
    let dir = tempfile::tempdir().unwrap();

    let path = dir.path().join("unknown_key.toml");
    fs::write(&path, "profile = \"genesys2\"\n[link]\nlatency = 2\njitter = 1\n").unwrap();
    assert!(matches!(ChipsetConfig::load(Some(&path)), Err(ConfigError::Parse(_))));

    let path = dir.path().join("bad_threshold.toml");
    fs::write(&path, "profile = \"nexys-video\"\n[chip]\nsend_credit_threshold = 12\n").unwrap();
    assert!(matches!(ChipsetConfig::load(Some(&path)), Err(ConfigError::ThresholdExceedsDepth { .. })));

    let path = dir.path().join("missing.toml");
    assert!(matches!(ChipsetConfig::load(Some(&path)), Err(ConfigError::Io { .. })));
}

// The only test that touches the environment.
#[test]
fn profile_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latency.toml");
    fs::write(&path, "[link]\nlatency = 5\n").unwrap();

    std::env::set_var(PROFILE_ENV, "piton-board");
    let config = ChipsetConfig::load(Some(&path));
    let chosen = ChipsetConfig::load_with(Some(&path), Some(BoardProfile::Vcu118));
    let named = ChipsetConfig::load_with(None, Some(BoardProfile::Vc707));
    std::env::set_var(PROFILE_ENV, "no-such-board");
    let unknown = ChipsetConfig::load(Some(&path));
    std::env::remove_var(PROFILE_ENV);

    let config = config.unwrap();
    assert_eq!(config.profile, BoardProfile::PitonBoard);
    assert_eq!(config.link.latency, 5);
    assert_eq!(config.chip, ChipsetConfig::piton_board().chip);
    assert!(matches!(unknown, Err(ConfigError::UnknownProfile(name)) if name == "no-such-board"));

    // An explicit profile outranks the environment.
    let chosen = chosen.unwrap();
    assert_eq!(chosen.profile, BoardProfile::Vcu118);
    assert_eq!(chosen.link.latency, 5);
    assert_eq!(named.unwrap(), ChipsetConfig::vc707());
}
