//! Recognition simulation helpers
//!
//! Synthesizes the decision payload a real sensor would produce for one
//! capture: plate text, configured reliability/context, per-character
//! reliability spread and a database match when the plate is known.

use rand::rngs::StdRng;
use rand::Rng;

use crate::protocol::{
    CharReliability, DatabaseMatch, Decision, RecognitionEvent, ReliabilityPerCharacter,
};

/// 1x1 transparent PNG standing in for camera JPEG data.
pub(crate) const SAMPLE_JPEG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Random European-style plate: two letters, three digits, two letters.
pub(crate) fn random_plate(rng: &mut StdRng) -> String {
    let mut plate = String::with_capacity(7);
    for _ in 0..2 {
        plate.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
    }
    for _ in 0..3 {
        plate.push(DIGITS[rng.gen_range(0..DIGITS.len())] as char);
    }
    for _ in 0..2 {
        plate.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
    }
    plate
}

/// Build one synthesized recognition event.
pub(crate) fn synthesize_event(
    rng: &mut StdRng,
    plate: String,
    reliability: u8,
    context: &str,
    date_ms: i64,
    in_database: bool,
) -> RecognitionEvent {
    let floor = reliability.saturating_sub(10);
    let chars = plate
        .chars()
        .enumerate()
        .map(|(index, _)| CharReliability {
            index: index.to_string(),
            reliability: rng.gen_range(u32::from(floor)..=100).to_string(),
        })
        .collect();

    let database = in_database.then(|| DatabaseMatch {
        plate: plate.clone(),
        distance: "0".to_string(),
    });

    RecognitionEvent {
        date: date_ms.to_string(),
        decision: Decision {
            plate: Some(plate),
            reliability: Some(reliability.to_string()),
            context: Some(context.to_string()),
            jpeg: Some(SAMPLE_JPEG.to_string()),
            reliability_per_character: Some(ReliabilityPerCharacter { chars }),
            database,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_random_plate_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let plate = random_plate(&mut rng);
            let chars: Vec<char> = plate.chars().collect();
            assert_eq!(chars.len(), 7);
            assert!(chars[..2].iter().all(char::is_ascii_uppercase));
            assert!(chars[2..5].iter().all(char::is_ascii_digit));
            assert!(chars[5..].iter().all(char::is_ascii_uppercase));
        }
    }

    #[test]
    fn test_synthesized_event_fields() {
        let mut rng = StdRng::seed_from_u64(7);
        let event = synthesize_event(&mut rng, "AB123CD".to_string(), 80, "F", 999, true);
        assert_eq!(event.date, "999");
        let decision = &event.decision;
        assert_eq!(decision.plate.as_deref(), Some("AB123CD"));
        assert_eq!(decision.reliability.as_deref(), Some("80"));
        assert_eq!(decision.context.as_deref(), Some("F"));
        assert!(decision.jpeg.is_some());

        let per_char = decision.reliability_per_character.as_ref().unwrap();
        assert_eq!(per_char.chars.len(), 7);
        for entry in &per_char.chars {
            let value: u32 = entry.reliability.parse().unwrap();
            assert!((70..=100).contains(&value));
        }

        let db = decision.database.as_ref().unwrap();
        assert_eq!(db.distance, "0");
    }

    #[test]
    fn test_no_database_match_when_unknown() {
        let mut rng = StdRng::seed_from_u64(7);
        let event = synthesize_event(&mut rng, "AB123CD".to_string(), 80, "F", 0, false);
        assert!(event.decision.database.is_none());
    }
}
