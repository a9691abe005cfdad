use clantune::config::{
    AncestryChoice, AppConfig, ConfigManager, CrossbreedingChoice, MutationChoice,
};
use clantune::error::ClanTuneError;
use clantune::types::Value;
use std::fs;

const EXPERIMENT: &str = r#"
[evolution]
population_size = 24
generations = 40
seed = 1234

[strategies]
top_n = 2

[strategies.ancestry]
kind = "boltzmann"
temperature = 0.5

[strategies.crossbreeding]
kind = "simulated_binary"
eta = 20.0

[strategies.mutation]
kind = "uniform"
mutation_chance = 0.2

[[search_space.hyperparameters]]
name = "learning_rate"
type = "logfloat"
value = 0.001
min = 0.00001
max = 0.1
target = 0.0005

[[search_space.hyperparameters]]
name = "optimizer"
type = "string"
value = "adam"
options = ["adam", "sgd", "rmsprop"]
can_crossbreed = false
target = "sgd"

[[search_space.hyperparameters]]
name = "layers"
type = "int"
value = 3
min = 1
max = 8
"#;

#[test]
fn test_load_experiment_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.toml");
    fs::write(&path, EXPERIMENT).unwrap();

    let manager = ConfigManager::new();
    manager.load_from_file(&path).unwrap();
    let config = manager.get();

    assert_eq!(config.evolution.population_size, 24);
    assert_eq!(config.evolution.generations, 40);
    assert_eq!(config.evolution.seed, Some(1234));
    assert_eq!(config.strategies.top_n, Some(2));
    assert_eq!(config.strategies.ancestry, AncestryChoice::Boltzmann { temperature: 0.5 });
    assert_eq!(
        config.strategies.crossbreeding,
        CrossbreedingChoice::SimulatedBinary {
            eta: 20.0,
            metalearning: false
        }
    );
    assert_eq!(
        config.strategies.mutation,
        MutationChoice::Uniform {
            mutation_chance: 0.2,
            metalearning: false
        }
    );

    let founder = config.search_space.founder().unwrap();
    let hps = founder.as_hyperparameters();
    assert_eq!(hps["optimizer"], Value::String("adam".to_string()));
    assert_eq!(hps["layers"], Value::Integer(3));
    assert!(!founder.allele("optimizer").unwrap().can_crossbreed());
    assert_eq!(
        config.search_space.targets()["optimizer"],
        Value::String("sgd".to_string())
    );
}

#[test]
fn test_missing_sections_use_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    fs::write(&path, "[evolution]\ngenerations = 3\n").unwrap();

    let manager = ConfigManager::new();
    manager.load_from_file(&path).unwrap();
    let config = manager.get();

    assert_eq!(config.evolution.generations, 3);
    assert_eq!(config.evolution.population_size, 16);
    assert_eq!(config.strategies, AppConfig::default().strategies);
    assert_eq!(config.search_space, AppConfig::default().search_space);
}

#[test]
fn test_invalid_file_keeps_previous_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[strategies.ancestry]\nkind = \"tournament\"\ntournament_size = 1\n").unwrap();

    let manager = ConfigManager::new();
    let err = manager.load_from_file(&path).unwrap_err();
    assert!(matches!(err, ClanTuneError::InvalidParameter(_)));
    assert_eq!(manager.get(), AppConfig::default());
}

#[test]
fn test_unknown_strategy_kind_fails_to_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unknown.toml");
    fs::write(&path, "[strategies.mutation]\nkind = \"annealing\"\n").unwrap();

    let err = ConfigManager::new().load_from_file(&path).unwrap_err();
    assert!(matches!(err, ClanTuneError::Configuration(_)));
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("experiment.toml");
    let saved = dir.path().join("saved.toml");
    fs::write(&source, EXPERIMENT).unwrap();

    let manager = ConfigManager::new();
    manager.load_from_file(&source).unwrap();
    manager.save_to_file(&saved).unwrap();

    let reloaded = ConfigManager::new();
    reloaded.load_from_file(&saved).unwrap();
    assert_eq!(reloaded.get(), manager.get());
}

#[test]
fn test_update_rolls_back_invalid_edit() {
    let manager = ConfigManager::new();
    manager
        .update(|config| config.evolution.generations = 50)
        .unwrap();
    assert_eq!(manager.get().evolution.generations, 50);

    let result = manager.update(|config| config.evolution.population_size = 0);
    assert!(result.is_err());
    assert_eq!(manager.get().evolution.population_size, 16);
}
