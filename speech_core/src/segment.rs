//! Sentence segmentation for streamed text.
//!
//! A text producer (typically a streaming language-model response) emits
//! arbitrary deltas. [`SentenceSplitter`] buffers them and releases whole
//! sentences, which are the unit the engine synthesizes and plays.

use futures::{Stream, StreamExt};

const TERMINATORS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 6] = ['"', '\'', '”', '’', ')', ']'];
// Words whose trailing period does not end a sentence
const ABBREVIATIONS: [&str; 8] = ["dr.", "mr.", "mrs.", "ms.", "prof.", "vs.", "e.g.", "i.e."];

#[derive(Debug, Default)]
pub struct SentenceSplitter {
    buffer: String,
}

impl SentenceSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a delta; returns every sentence completed by it, trimmed.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);
        let mut sentences = Vec::new();
        while let Some(end) = self.find_boundary() {
            let sentence: String = self.buffer.drain(..end).collect();
            let sentence = sentence.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
        }
        sentences
    }

    /// Release whatever is left once the producer is done.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn find_boundary(&self) -> Option<usize> {
        let chars: Vec<(usize, char)> = self.buffer.char_indices().collect();
        for (pos, &(byte, c)) in chars.iter().enumerate() {
            if c == '\n' {
                return Some(byte + 1);
            }
            if !TERMINATORS.contains(&c) {
                continue;
            }

            let mut next = pos + 1;
            while next < chars.len()
                && (TERMINATORS.contains(&chars[next].1) || CLOSERS.contains(&chars[next].1))
            {
                next += 1;
            }
            // Can't tell yet whether the run ends the sentence
            if next == chars.len() {
                return None;
            }
            if chars[next].1.is_whitespace() && !self.is_non_terminal(byte + c.len_utf8()) {
                return Some(chars[next].0);
            }
        }
        None
    }

    /// Abbreviations and list markers like "2." at the start of a line.
    fn is_non_terminal(&self, end: usize) -> bool {
        let head = &self.buffer[..end];
        let word_start = head
            .rfind(char::is_whitespace)
            .map(|i| i + head[i..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(0);
        let word = head[word_start..].to_lowercase();

        if ABBREVIATIONS.contains(&word.as_str()) {
            return true;
        }
        let digits = &word[..word.len() - 1];
        let line_start = head[..word_start].trim_end_matches([' ', '\t']);
        !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && (line_start.is_empty() || line_start.ends_with('\n'))
    }
}

/// Adapt a stream of text deltas into a stream of sentences.
pub fn sentences<S>(deltas: S) -> impl Stream<Item = String>
where
    S: Stream<Item = String>,
{
    async_stream::stream! {
        let mut splitter = SentenceSplitter::new();
        futures::pin_mut!(deltas);
        while let Some(delta) = deltas.next().await {
            for sentence in splitter.push(&delta) {
                yield sentence;
            }
        }
        if let Some(rest) = splitter.finish() {
            yield rest;
        }
    }
}

/// Strip markdown and normalise spacing so the text reads naturally aloud.
pub fn clean_for_speech(text: &str) -> String {
    let mut cleaned = text.to_string();

    // Fenced code blocks are dropped entirely
    while let Some(start) = cleaned.find("```") {
        match cleaned[start + 3..].find("```") {
            Some(end) => cleaned.replace_range(start..start + 3 + end + 3, " "),
            None => {
                cleaned.truncate(start);
                break;
            }
        }
    }

    // `code` -> code
    cleaned = cleaned.replace('`', "");

    // [text](url) -> text
    let mut pos = 0;
    while let Some(open) = cleaned[pos..].find('[').map(|i| pos + i) {
        let Some(close) = cleaned[open..].find("](").map(|i| open + i) else {
            break;
        };
        let Some(paren) = cleaned[close..].find(')').map(|i| close + i) else {
            break;
        };
        let label = cleaned[open + 1..close].to_string();
        cleaned.replace_range(open..=paren, &label);
        pos = open + label.len();
    }

    let lines: Vec<String> = cleaned
        .lines()
        .map(|line| {
            let line = line.trim_start().trim_start_matches('#').trim_start();
            let line = ["- ", "* ", "+ "]
                .iter()
                .find_map(|marker| line.strip_prefix(marker))
                .unwrap_or(line);
            match line.split_once(". ") {
                Some((num, rest)) if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) => {
                    rest.to_string()
                }
                _ => line.to_string(),
            }
        })
        .collect();
    cleaned = lines.join(" ");

    for marker in ["**", "__", "~~", "*"] {
        cleaned = cleaned.replace(marker, "");
    }

    let mut result = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    for punct in [",", ".", "!", "?", ";", ":"] {
        result = result.replace(&format!(" {punct}"), punct);
    }
    result.trim().to_string()
}
