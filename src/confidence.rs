// Display confidence for a resolved emotion

use crate::models::Emotion;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::ops::Range;

/// Percent range drawn for an emotion. Upper bound is exclusive.
pub fn confidence_range(emotion: Emotion) -> Range<u8> {
    match emotion {
        Emotion::Happy => 85..95,
        Emotion::Sad => 80..95,
        Emotion::Disgusted => 83..93,
        Emotion::Fearful => 82..97,
        _ => 65..95,
    }
}

/// Produces cosmetic confidence percentages. Score magnitude is not consulted.
pub struct ConfidenceSynthesizer<R = StdRng> {
    rng: R,
}

impl ConfidenceSynthesizer<StdRng> {
    /// Synthesizer seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: RngCore> ConfidenceSynthesizer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn confidence_for(&mut self, emotion: Emotion) -> u8 {
        self.rng.gen_range(confidence_range(emotion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn zero_draw_yields_lower_bound() {
        let mut synth = ConfidenceSynthesizer::new(StepRng::new(0, 0));
        assert_eq!(synth.confidence_for(Emotion::Happy), 85);
        assert_eq!(synth.confidence_for(Emotion::Sad), 80);
        assert_eq!(synth.confidence_for(Emotion::Disgusted), 83);
        assert_eq!(synth.confidence_for(Emotion::Fearful), 82);
        assert_eq!(synth.confidence_for(Emotion::Neutral), 65);
    }

    #[test]
    fn draws_stay_in_range() {
        let mut synth = ConfidenceSynthesizer::new(StdRng::seed_from_u64(7));
        for emotion in Emotion::ALL {
            let range = confidence_range(emotion);
            for _ in 0..200 {
                let value = synth.confidence_for(emotion);
                assert!(range.contains(&value), "{emotion}: {value}");
            }
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = ConfidenceSynthesizer::new(StdRng::seed_from_u64(42));
        let mut b = ConfidenceSynthesizer::new(StdRng::seed_from_u64(42));
        for emotion in Emotion::ALL {
            assert_eq!(a.confidence_for(emotion), b.confidence_for(emotion));
        }
    }
}
