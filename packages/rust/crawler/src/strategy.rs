//! Ordered fallback chains of named extraction strategies.

use tracing::debug;

/// One named way of extracting a value from `I`.
pub struct Strategy<I: ?Sized, T> {
    pub name: &'static str,
    pub run: fn(&I) -> Option<T>,
}

impl<I: ?Sized, T> Strategy<I, T> {
    pub const fn new(name: &'static str, run: fn(&I) -> Option<T>) -> Self {
        Self { name, run }
    }
}

/// Run `strategies` in order and return the first hit with its strategy name.
pub fn first_match<I: ?Sized, T>(
    strategies: &[Strategy<I, T>],
    input: &I,
) -> Option<(&'static str, T)> {
    for strategy in strategies {
        if let Some(value) = (strategy.run)(input) {
            debug!(strategy = strategy.name, "strategy matched");
            return Some((strategy.name, value));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never(_: &str) -> Option<usize> {
        None
    }
    fn length(s: &str) -> Option<usize> {
        Some(s.len())
    }
    fn digits(s: &str) -> Option<usize> {
        Some(s.chars().filter(char::is_ascii_digit).count())
    }

    #[test]
    fn first_success_short_circuits() {
        let chain: [Strategy<str, usize>; 3] = [
            Strategy::new("never", never),
            Strategy::new("length", length),
            Strategy::new("digits", digits),
        ];
        assert_eq!(first_match(&chain, "ab12"), Some(("length", 4)));
    }

    #[test]
    fn exhausted_chain_is_none() {
        let chain: [Strategy<str, usize>; 1] = [Strategy::new("never", never)];
        assert_eq!(first_match(&chain, "anything"), None);
        assert_eq!(first_match::<str, usize>(&[], "anything"), None);
    }
}
