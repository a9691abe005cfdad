mod common;

use clantune::engines::strategies::{
    validate_ancestry, AncestryStrategy, BoltzmannSelection, EliteBreeds, RankSelection, TopN,
    TournamentSelection,
};
use clantune::error::ClanTuneError;
use common::*;
use uuid::Uuid;

#[test]
fn test_tournament_probabilities_are_win_shares() {
    let population = scored_population(&[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0]);
    let tournament = TournamentSelection::new(2, 4).unwrap();
    let mut rng = ScriptedRandom::new().indices([0, 1, 0, 2, 0, 1, 1, 2]);

    let ancestry = tournament.select(&population[0], &population, &mut rng).unwrap();

    assert_eq!(probabilities(&ancestry), vec![0.75, 0.25, 0.0]);
    assert!(rng.is_exhausted());
}

#[test]
fn test_tournament_tie_goes_to_earliest_draw() {
    let population = scored_population(&[0.0, 1.0], &[1.0, 1.0]);
    let tournament = TournamentSelection::new(2, 1).unwrap();
    let mut rng = ScriptedRandom::new().indices([1, 0]);

    let ancestry = tournament.select(&population[0], &population, &mut rng).unwrap();
    assert_eq!(probabilities(&ancestry), vec![0.0, 1.0]);
}

#[test]
fn test_elite_breeds_tiers() {
    // Rank order by fitness: 1, 3, 2, 4, 0
    let population = scored_population(&[0.0; 5], &[5.0, 1.0, 3.0, 2.0, 4.0]);
    let elite = EliteBreeds::new(2, 1).unwrap();
    let mut rng = ScriptedRandom::new();

    let dying = elite.select(&population[0], &population, &mut rng).unwrap();
    assert_eq!(probabilities(&dying), vec![0.0, 0.5, 0.0, 0.5, 0.0]);

    let surviving = elite.select(&population[2], &population, &mut rng).unwrap();
    assert_eq!(probabilities(&surviving), vec![0.0, 0.0, 1.0, 0.0, 0.0]);

    let thriving = elite.select(&population[1], &population, &mut rng).unwrap();
    assert_eq!(probabilities(&thriving), vec![0.0, 1.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_elite_breeds_needs_a_survivor_tier() {
    let population = scored_population(&[0.0; 5], &[1.0, 2.0, 3.0, 4.0, 5.0]);
    let elite = EliteBreeds::new(2, 3).unwrap();
    let result = elite.select(&population[0], &population, &mut ScriptedRandom::new());
    assert!(matches!(result, Err(ClanTuneError::InvalidParameter(_))));
}

#[test]
fn test_rank_selection_with_top_n() {
    let population = scored_population(&[0.0; 4], &[0.1, 0.2, 0.3, 0.4]);
    let rank = RankSelection::new(1.0).unwrap();
    let mut rng = ScriptedRandom::new();

    let full = rank.select(&population[3], &population, &mut rng).unwrap();
    let expected = [0.4, 0.3, 0.2, 0.1];
    for (actual, expected) in probabilities(&full).iter().zip(expected) {
        assert_close(*actual, expected);
    }

    let top_two = TopN::new(2, Box::new(rank)).unwrap();
    let ancestry = top_two.select(&population[3], &population, &mut rng).unwrap();
    let probs = probabilities(&ancestry);
    assert_close(probs[0], 4.0 / 7.0);
    assert_close(probs[1], 3.0 / 7.0);
    assert_eq!(&probs[2..], &[0.0, 0.0]);
}

#[test]
fn test_boltzmann_weights() {
    let population = scored_population(&[0.0; 2], &[0.0, 2f64.ln()]);
    let boltzmann = BoltzmannSelection::new(1.0).unwrap();
    let ancestry = boltzmann
        .select(&population[0], &population, &mut ScriptedRandom::new())
        .unwrap();
    let probs = probabilities(&ancestry);
    assert_close(probs[0], 2.0 / 3.0);
    assert_close(probs[1], 1.0 / 3.0);
}

#[test]
fn test_boltzmann_survives_large_fitness() {
    let population = scored_population(&[0.0; 2], &[1.0e6, 1.0e6 + 1.0]);
    let boltzmann = BoltzmannSelection::new(0.01).unwrap();
    let ancestry = boltzmann
        .select(&population[1], &population, &mut ScriptedRandom::new())
        .unwrap();
    assert!(validate_ancestry(&ancestry, &population).is_ok());
    assert!(probabilities(&ancestry)[0] > 0.99);
}

#[test]
fn test_boltzmann_all_infinite_fitness_is_uniform() {
    let population = scored_population(&[0.0; 4], &[f64::INFINITY; 4]);
    let ancestry = BoltzmannSelection::new(1.0)
        .unwrap()
        .select(&population[2], &population, &mut ScriptedRandom::new())
        .unwrap();
    for p in probabilities(&ancestry) {
        assert_close(p, 0.25);
    }
}

#[test]
fn test_boltzmann_infinite_members_get_no_weight() {
    let population = scored_population(&[0.0; 3], &[1.0, f64::INFINITY, 1.0]);
    let ancestry = BoltzmannSelection::new(1.0)
        .unwrap()
        .select(&population[1], &population, &mut ScriptedRandom::new())
        .unwrap();
    assert_eq!(probabilities(&ancestry), vec![0.5, 0.0, 0.5]);
}

#[test]
fn test_select_requires_fitness() {
    let mut population = scored_population(&[0.0; 3], &[1.0, 2.0, 3.0]);
    population[2] = float_genome(0.0);
    let result = RankSelection::default().select(&population[0], &population, &mut ScriptedRandom::new());
    assert!(matches!(result, Err(ClanTuneError::ContractViolation(_))));
}

#[test]
fn test_select_requires_member_candidate() {
    let population = scored_population(&[0.0; 3], &[1.0, 2.0, 3.0]);
    let outsider = float_genome(0.0).with_fitness(0.5);
    let result = RankSelection::default().select(&outsider, &population, &mut ScriptedRandom::new());
    assert!(matches!(result, Err(ClanTuneError::ContractViolation(_))));
}

#[test]
fn test_validate_ancestry_rejects_bad_declarations() {
    let population = scored_population(&[0.0; 2], &[1.0, 2.0]);

    let short_sum = ancestry_for(&population, &[0.5, 0.4]);
    assert!(matches!(
        validate_ancestry(&short_sum, &population),
        Err(ClanTuneError::InvalidAncestry(_))
    ));

    let negative = ancestry_for(&population, &[1.5, -0.5]);
    assert!(validate_ancestry(&negative, &population).is_err());

    let wrong_length = ancestry_for(&population[..1], &[1.0]);
    assert!(validate_ancestry(&wrong_length, &population).is_err());

    let misaligned = vec![(0.5, population[1].id()), (0.5, Uuid::new_v4())];
    assert!(validate_ancestry(&misaligned, &population).is_err());

    let good = ancestry_for(&population, &[0.25, 0.75]);
    assert!(validate_ancestry(&good, &population).is_ok());
}
