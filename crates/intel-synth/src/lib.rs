//! Synthetic profile record generation behind an injectable random source.

use intel_core::{
    avatar_ref_for, ExtractionRecord, ValidatedIdentifier, SKILLS_PER_RECORD, SKILL_POOL,
    TITLE_POOL,
};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

pub const CRATE_NAME: &str = "intel-synth";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;

/// Turns one validated identifier into a display-ready record.
///
/// Implementations draw every random choice from the supplied `rng`, so a
/// seeded or mocked source yields reproducible records.
pub trait RecordGenerator: Send + Sync {
    fn generate(&self, identifier: &ValidatedIdentifier, rng: &mut dyn RngCore) -> ExtractionRecord;

    /// Label reported as the current target while the identifier is processed.
    fn label_for(&self, identifier: &ValidatedIdentifier) -> String {
        identifier.display_name()
    }
}

/// Samples titles and skills from the fixed pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticProfileGenerator;

impl RecordGenerator for SyntheticProfileGenerator {
    fn generate(&self, identifier: &ValidatedIdentifier, rng: &mut dyn RngCore) -> ExtractionRecord {
        let display_name = identifier.display_name();
        let title = sample_title(&mut *rng).to_string();
        let skills = sample_skills(&mut *rng)
            .into_iter()
            .map(str::to_string)
            .collect();
        ExtractionRecord {
            id: short_token(&mut *rng),
            avatar_ref: avatar_ref_for(&display_name),
            display_name,
            title,
            skills,
            source_url: identifier.as_str().to_string(),
        }
    }
}

pub fn default_generator() -> Box<dyn RecordGenerator> {
    Box::new(SyntheticProfileGenerator)
}

pub fn sample_title<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    TITLE_POOL[rng.gen_range(0..TITLE_POOL.len())]
}

/// Uniform shuffle of the whole pool, first three taken. Never repeats a skill.
pub fn sample_skills<R: Rng + ?Sized>(rng: &mut R) -> Vec<&'static str> {
    let mut pool = SKILL_POOL;
    pool.shuffle(rng);
    pool[..SKILLS_PER_RECORD].to_vec()
}

/// Short lowercase base-36 token. Collisions are tolerated.
pub fn short_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
