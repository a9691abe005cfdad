pub mod evolution;
pub mod genetics;
pub mod strategies;
