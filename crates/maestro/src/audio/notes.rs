//! Equal-tempered pitch lookup anchored at octave 4 (a = 440 Hz)

pub const DEFAULT_FREQUENCY: f64 = 440.0;
pub const DEFAULT_OCTAVE: i32 = 4;

const NOTE_TABLE: [(&str, f64); 12] = [
    ("c", 261.63),
    ("c#", 277.18),
    ("d", 293.66),
    ("d#", 311.13),
    ("e", 329.63),
    ("f", 349.23),
    ("f#", 369.99),
    ("g", 392.00),
    ("g#", 415.30),
    ("a", 440.00),
    ("a#", 466.16),
    ("b", 493.88),
];

/// Octave-4 frequency of a note name such as `c` or `f#`
pub fn base_frequency(name: &str) -> Option<f64> {
    let name = name.to_ascii_lowercase();
    NOTE_TABLE
        .iter()
        .find(|(note, _)| *note == name)
        .map(|(_, frequency)| *frequency)
}

/// Frequency of `name` in `octave`; unknown names fall back to 440 Hz before scaling
pub fn frequency(name: &str, octave: i32) -> f64 {
    let base = base_frequency(name).unwrap_or(DEFAULT_FREQUENCY);
    base * 2f64.powi(octave - DEFAULT_OCTAVE)
}

/// Split a token like `c#5` into its name and octave. The octave is a single
/// trailing digit and defaults to 4. Tokens ending in several digits, such as
/// `c10`, are not split, so their name is unknown and they fall back to 440 Hz.
pub fn split_note(token: &str) -> (&str, i32) {
    let name = token.trim_end_matches(|c: char| c.is_ascii_digit());
    match &token[name.len()..] {
        digit if digit.len() == 1 => {
            let octave = digit.parse().unwrap_or(DEFAULT_OCTAVE);
            (name, octave)
        }
        _ => (token, DEFAULT_OCTAVE),
    }
}

/// Frequency of a note token; malformed tokens never fail
pub fn note_frequency(token: &str) -> f64 {
    let (name, octave) = split_note(token);
    frequency(name, octave)
}

/// Pitch used by `play N`: the `c` of octave `floor(N / 12)`.
/// Pitch is deliberately quantized to whole octaves.
pub fn octave_frequency(midi: f64) -> f64 {
    let octave = (midi / 12.0).floor() as i32;
    frequency("c", octave)
}
