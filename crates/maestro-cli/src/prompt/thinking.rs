use rand::seq::SliceRandom;

const THINKING_MESSAGES: &[&str] = &[
    "Tuning up",
    "Counting in",
    "Warming up the oscillators",
    "Reading the score",
    "Finding the groove",
    "Setting the tempo",
    "Checking the mix",
    "Rehearsing",
    "Turning the page",
    "Listening back",
];

pub fn get_random_thinking_message() -> &'static str {
    THINKING_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Thinking")
}
