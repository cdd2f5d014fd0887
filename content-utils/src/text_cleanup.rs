use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalizes answer text so that two spellings of the same answer compare equal.
///
/// Strips combining marks (Hebrew niqqud, Latin accents), folds quote and dash variants, lowercases,
/// and collapses whitespace.
pub fn normalize_answer(text: &str) -> String {
    let folded = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            // geresh, right/left single quotes, prime
            '\u{05F3}' | '\u{2018}' | '\u{2019}' | '\u{2032}' | '`' | '\u{00B4}' => '\'',
            // gershayim, double quotes
            '\u{05F4}' | '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
            // maqaf, dashes, minus
            '\u{05BE}' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}'
            | '\u{2212}' => '-',
            _ => c,
        })
        .collect::<String>()
        .to_lowercase();

    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .nfc()
        .collect()
}

pub fn same_answer(a: &str, b: &str) -> bool {
    normalize_answer(a) == normalize_answer(b)
}
