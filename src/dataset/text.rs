//! Text normalisation and tokenisation
//!
//! Turns are lower-cased and punctuation / symbol characters are split into
//! their own tokens before whitespace tokenisation. Runs of the same
//! punctuation mark stay together ("!!!" is one token).

/// Normalise a turn and split it into tokens
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut symbols = String::new();

    let flush = |buf: &mut String, tokens: &mut Vec<String>| {
        if !buf.is_empty() {
            tokens.push(std::mem::take(buf));
        }
    };

    for ch in text.chars() {
        if ch.is_whitespace() {
            flush(&mut word, &mut tokens);
            flush(&mut symbols, &mut tokens);
        } else if is_word_char(ch) {
            flush(&mut symbols, &mut tokens);
            word.extend(ch.to_lowercase());
        } else {
            flush(&mut word, &mut tokens);
            if symbols.chars().last().is_some_and(|last| last != ch) {
                flush(&mut symbols, &mut tokens);
            }
            symbols.push(ch);
        }
    }
    flush(&mut word, &mut tokens);
    flush(&mut symbols, &mut tokens);

    tokens
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '\''
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_split_punctuation() {
        assert_eq!(tokenize("Hello, World!!"), vec!["hello", ",", "world", "!!"]);
    }

    #[test]
    fn test_keeps_apostrophes() {
        assert_eq!(tokenize("I don't know"), vec!["i", "don't", "know"]);
    }

    #[test]
    fn test_mixed_symbols_are_separate() {
        assert_eq!(tokenize("ok?!"), vec!["ok", "?", "!"]);
        assert_eq!(tokenize("😂😂 lol"), vec!["😂😂", "lol"]);
    }

    #[test]
    fn test_blank_input() {
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("").is_empty());
    }
}
