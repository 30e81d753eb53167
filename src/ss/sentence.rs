//! Sentence splitting/joining and the phrase-token insertion rules that
//! back WRITE and sentence locking.

const DELIMITERS: [char; 3] = ['.', '!', '?'];

/// Splits `content` into sentences, each retaining its terminating
/// delimiter. A trailing fragment with no delimiter is kept as a final
/// sentence (so it can later be completed in place).
pub fn parse_sentences(content: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in content.chars() {
        current.push(ch);
        if DELIMITERS.contains(&ch) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// `true` if the last non-whitespace character in `content` is a sentence
/// delimiter; a new sentence may only be appended when this holds.
pub fn ends_with_delimiter(content: &str) -> bool {
    match content.trim_end().chars().last() {
        Some(c) => DELIMITERS.contains(&c),
        None => false,
    }
}

/// `true` if a new sentence (`idx == N`) may be opened on `content`: either
/// the file is still empty (nothing written yet) or the existing content
/// already ends with a delimiter. Shared by `LOCK_SENTENCE` and `WRITE` so
/// the two don't drift on the empty-file edge case.
pub fn can_append_sentence(content: &str) -> bool {
    content.trim().is_empty() || ends_with_delimiter(content)
}

pub fn reconstruct_content(sentences: &[String]) -> String {
    sentences.join(" ")
}

/// Applies WRITE's `<word_index> <phrase>` lines to one sentence's word
/// list: each line inserts its phrase as a single contiguous token at the
/// given 1-based position among the existing whitespace-separated words.
/// `word_index` may be at most `words.len() + 1` (append).
pub fn apply_inserts(sentence: &str, lines: &str) -> Result<String, String> {
    let mut tokens: Vec<String> = if sentence.is_empty() {
        Vec::new()
    } else {
        sentence.split_whitespace().map(str::to_string).collect()
    };

    for line in lines.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((index_str, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let Ok(word_index) = index_str.parse::<usize>() else {
            continue;
        };
        let phrase = rest.trim();
        if phrase.is_empty() {
            continue;
        }
        if word_index < 1 || word_index > tokens.len() + 1 {
            return Err(format!("word index out of range (1-{} allowed)", tokens.len() + 1));
        }
        tokens.insert(word_index - 1, phrase.to_string());
    }

    Ok(tokens.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_each_delimiter_keeping_it() {
        let sentences = parse_sentences("Hello world. How are you? Fine!");
        assert_eq!(sentences, vec!["Hello world.", "How are you?", "Fine!"]);
    }

    #[test]
    fn keeps_trailing_fragment_without_delimiter() {
        let sentences = parse_sentences("Done.  In progress");
        assert_eq!(sentences, vec!["Done.", "In progress"]);
    }

    #[test]
    fn detects_trailing_delimiter() {
        assert!(ends_with_delimiter("Done.  \n"));
        assert!(!ends_with_delimiter("Still writing"));
        assert!(!ends_with_delimiter(""));
    }

    #[test]
    fn can_append_sentence_allows_empty_file_or_trailing_delimiter() {
        assert!(can_append_sentence(""));
        assert!(can_append_sentence("   "));
        assert!(can_append_sentence("Done."));
        assert!(!can_append_sentence("Still writing"));
    }

    #[test]
    fn inserts_phrase_as_single_token() {
        let updated = apply_inserts("The cat sat.", "2 big black").unwrap();
        assert_eq!(updated, "The big black cat sat.");
    }

    #[test]
    fn append_at_end_is_allowed() {
        let updated = apply_inserts("Hello", "2 world").unwrap();
        assert_eq!(updated, "Hello world");
    }

    #[test]
    fn rejects_out_of_range_index() {
        assert!(apply_inserts("Hello", "5 nope").is_err());
        assert!(apply_inserts("Hello", "0 nope").is_err());
    }
}
