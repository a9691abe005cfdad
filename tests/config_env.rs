use clantune::config::{ConfigManager, ENV_PREFIX};
use std::fs;

// Kept in its own test binary: environment variables are process-wide.
#[test]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.toml");
    fs::write(&path, "[evolution]\ngenerations = 3\nseed = 1\n").unwrap();

    std::env::set_var(format!("{}__EVOLUTION__SEED", ENV_PREFIX), "99");
    std::env::set_var(format!("{}__EVOLUTION__HALL_OF_FAME_SIZE", ENV_PREFIX), "4");

    let manager = ConfigManager::new();
    manager.load_from_file(&path).unwrap();
    let from_file = manager.get();

    manager.load_from_env().unwrap();
    let from_env = manager.get();

    std::env::remove_var(format!("{}__EVOLUTION__SEED", ENV_PREFIX));
    std::env::remove_var(format!("{}__EVOLUTION__HALL_OF_FAME_SIZE", ENV_PREFIX));

    assert_eq!(from_file.evolution.generations, 3);
    assert_eq!(from_file.evolution.seed, Some(99));
    assert_eq!(from_file.evolution.hall_of_fame_size, 4);

    assert_eq!(from_env.evolution.generations, 20);
    assert_eq!(from_env.evolution.seed, Some(99));
}
