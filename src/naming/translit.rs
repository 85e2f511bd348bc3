//! Devanagari to Roman transliteration for handle generation.
//!
//! Produces a readable ASCII approximation: consonants carry the inherent
//! "a" unless a vowel sign or virama follows, anusvara and candrabindu map
//! to "n", visarga is dropped. Long and short vowels collapse to the same
//! letter since social handles have no use for vowel length.

const VIRAMA: char = '\u{094D}';
const NUKTA: char = '\u{093C}';
const ANUSVARA: char = '\u{0902}';
const CANDRABINDU: char = '\u{0901}';
const VISARGA: char = '\u{0903}';

/// True if any character falls in the Devanagari block.
pub fn has_devanagari(text: &str) -> bool {
    text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))
}

fn consonant(c: char) -> Option<&'static str> {
    Some(match c {
        'क' => "k",
        'ख' => "kh",
        'ग' => "g",
        'घ' => "gh",
        'ङ' => "n",
        'च' => "ch",
        'छ' => "chh",
        'ज' => "j",
        'झ' => "jh",
        'ञ' => "n",
        'ट' => "t",
        'ठ' => "th",
        'ड' => "d",
        'ढ' => "dh",
        'ण' => "n",
        'त' => "t",
        'थ' => "th",
        'द' => "d",
        'ध' => "dh",
        'न' => "n",
        'प' => "p",
        'फ' => "ph",
        'ब' => "b",
        'भ' => "bh",
        'म' => "m",
        'य' => "y",
        'र' => "r",
        'ल' => "l",
        'ळ' => "l",
        'व' => "v",
        'श' => "sh",
        'ष' => "sh",
        'स' => "s",
        'ह' => "h",
        // Precomposed nukta forms
        '\u{0958}' => "q",  // क़
        '\u{0959}' => "kh", // ख़
        '\u{095A}' => "g",  // ग़
        '\u{095B}' => "z",  // ज़
        '\u{095C}' => "d",  // ड़
        '\u{095D}' => "dh", // ढ़
        '\u{095E}' => "f",  // फ़
        '\u{095F}' => "y",  // य़
        _ => return None,
    })
}

fn independent_vowel(c: char) -> Option<&'static str> {
    Some(match c {
        'अ' => "a",
        'आ' => "a",
        'इ' => "i",
        'ई' => "i",
        'उ' => "u",
        'ऊ' => "u",
        'ऋ' => "ri",
        'ए' => "e",
        'ऐ' => "ai",
        'ओ' => "o",
        'औ' => "au",
        _ => return None,
    })
}

fn vowel_sign(c: char) -> Option<&'static str> {
    Some(match c {
        '\u{093E}' => "a",  // ा
        '\u{093F}' => "i",  // ि
        '\u{0940}' => "i",  // ी
        '\u{0941}' => "u",  // ु
        '\u{0942}' => "u",  // ू
        '\u{0943}' => "ri", // ृ
        '\u{0947}' => "e",  // े
        '\u{0948}' => "ai", // ै
        '\u{094B}' => "o",  // ो
        '\u{094C}' => "au", // ौ
        _ => return None,
    })
}

fn digit(c: char) -> Option<char> {
    match c {
        '०'..='९' => {
            let offset = c as u32 - '०' as u32;
            char::from_u32('0' as u32 + offset)
        }
        _ => None,
    }
}

/// Transliterate mixed Devanagari/Latin text into lowercase ASCII.
/// Non-Devanagari characters pass through unchanged (lowercased);
/// downstream per-platform filters strip anything else.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // A consonant whose inherent "a" has not yet been resolved.
    let mut inherent_pending = false;

    let mut flush = |out: &mut String, pending: &mut bool| {
        if *pending {
            out.push('a');
            *pending = false;
        }
    };

    for c in text.chars() {
        if let Some(s) = consonant(c) {
            flush(&mut out, &mut inherent_pending);
            out.push_str(s);
            inherent_pending = true;
        } else if let Some(v) = vowel_sign(c) {
            out.push_str(v);
            inherent_pending = false;
        } else if c == VIRAMA {
            inherent_pending = false;
        } else if let Some(v) = independent_vowel(c) {
            flush(&mut out, &mut inherent_pending);
            out.push_str(v);
        } else if c == ANUSVARA || c == CANDRABINDU {
            flush(&mut out, &mut inherent_pending);
            out.push('n');
        } else if c == NUKTA || c == VISARGA {
            // Nukta was already folded into the precomposed forms above;
            // a combining nukta refines a sound we approximate anyway.
        } else if let Some(d) = digit(c) {
            flush(&mut out, &mut inherent_pending);
            out.push(d);
        } else if c == '।' || c == '॥' {
            flush(&mut out, &mut inherent_pending);
            out.push(' ');
        } else {
            flush(&mut out, &mut inherent_pending);
            out.extend(c.to_lowercase());
        }
    }
    flush(&mut out, &mut inherent_pending);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_devanagari() {
        assert!(has_devanagari("बांसवाड़ा"));
        assert!(has_devanagari("Kota की कहानी"));
        assert!(!has_devanagari("Kota Ke Kisse"));
    }

    #[test]
    fn consonant_carries_inherent_vowel() {
        assert_eq!(transliterate("कहानी"), "kahani");
        assert_eq!(transliterate("कोटा"), "kota");
    }

    #[test]
    fn vowel_sign_replaces_inherent_vowel() {
        assert_eq!(transliterate("की"), "ki");
        assert_eq!(transliterate("बूंदी"), "bundi");
    }

    #[test]
    fn anusvara_maps_to_n() {
        assert_eq!(transliterate("बांसवाड़ा"), "bansavada");
    }

    #[test]
    fn virama_suppresses_inherent_vowel() {
        // प्रताप: प + ् + र + त + ा + प
        assert_eq!(transliterate("प्रताप"), "pratapa");
    }

    #[test]
    fn mixed_script_passes_latin_through() {
        assert_eq!(transliterate("Kota की कहानी"), "kota ki kahani");
    }

    #[test]
    fn devanagari_digits_become_ascii() {
        assert_eq!(transliterate("सीजन २"), "sijana 2");
    }

    #[test]
    fn pure_ascii_output() {
        for title in ["बांसवाड़ा की कहानी", "उदयपुर", "चित्तौड़गढ़"] {
            assert!(transliterate(title).is_ascii(), "{title}");
        }
    }
}
