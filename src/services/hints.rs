//! Partial renderings of the current answer.

use rand::{Rng, seq::index};

/// Character standing in for hidden letters.
pub const MASK: char = '_';

/// Highest hint level ever shown for a question.
pub const MAX_HINT_LEVEL: u8 = 2;

/// Produces the hint text announced for a given level.
#[derive(Debug, Clone, Copy, Default)]
pub struct HintGenerator;

impl HintGenerator {
    /// Render the hint for `level`, or `None` for a level that does not exist.
    ///
    /// Level 1 reveals a random third of the letters and digits; level 2 hides
    /// only the vowels. The two renderings are independent of each other.
    pub fn render<R: Rng + ?Sized>(&self, answer: &str, level: u8, rng: &mut R) -> Option<String> {
        match level {
            1 => Some(reveal_random(answer, level, rng)),
            2 => Some(mask_vowels(answer)),
            _ => None,
        }
    }
}

/// Reveal `level / 3` of the alphanumeric characters, chosen uniformly.
///
/// Spaces and punctuation are always shown.
pub fn reveal_random<R: Rng + ?Sized>(answer: &str, level: u8, rng: &mut R) -> String {
    let chars: Vec<char> = answer.chars().collect();
    let maskable: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_alphanumeric())
        .map(|(i, _)| i)
        .collect();

    let amount = (maskable.len() * usize::from(level.min(3)) / 3).min(maskable.len());
    let mut revealed = vec![false; chars.len()];
    for pick in index::sample(rng, maskable.len(), amount) {
        revealed[maskable[pick]] = true;
    }

    chars
        .iter()
        .zip(revealed)
        .map(|(&c, shown)| if shown || !c.is_alphanumeric() { c } else { MASK })
        .collect()
}

/// Lowercase vowels, accented Latin forms included.
const VOWELS: &str = "aeiouàáâãäåāăąæèéêëēĕėęěìíîïĩīĭįòóôõöøōŏőœùúûüũūŭůűų";

/// Replace every vowel, regardless of case or accent, with [`MASK`].
pub fn mask_vowels(answer: &str) -> String {
    answer
        .chars()
        .map(|c| if is_vowel(c) { MASK } else { c })
        .collect()
}

fn is_vowel(c: char) -> bool {
    c.to_lowercase().all(|lower| VOWELS.contains(lower))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn first_hint_reveals_a_third_and_keeps_punctuation() {
        let mut rng = StdRng::seed_from_u64(7);
        let answer = "Super Mario Bros. 3";
        let hint = reveal_random(answer, 1, &mut rng);

        assert_eq!(hint.chars().count(), answer.chars().count());
        let shown = hint
            .chars()
            .zip(answer.chars())
            .filter(|(h, a)| a.is_alphanumeric() && h == a)
            .count();
        // 15 alphanumeric characters -> 5 revealed
        assert_eq!(shown, 5);
        for (h, a) in hint.chars().zip(answer.chars()) {
            if !a.is_alphanumeric() {
                assert_eq!(h, a);
            } else {
                assert!(h == a || h == MASK);
            }
        }
    }

    #[test]
    fn second_hint_masks_vowels_only() {
        assert_eq!(mask_vowels("Ocarina of Time"), "_c_r_n_ _f T_m_");
        assert_eq!(mask_vowels("BRB"), "BRB");
    }

    #[test]
    fn second_hint_masks_accented_vowels() {
        assert_eq!(mask_vowels("Pokémon"), "P_k_m_n");
        assert_eq!(mask_vowels("ÉCLAIR über"), "_CL__R _b_r");
    }

    #[test]
    fn unknown_levels_render_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let hints = HintGenerator;
        assert!(hints.render("Link", 0, &mut rng).is_none());
        assert!(hints.render("Link", 3, &mut rng).is_none());
        assert_eq!(hints.render("Link", 2, &mut rng).as_deref(), Some("L_nk"));
    }
}
