//! Grounded prompt assembly and answer parsing.
//!
//! The model is given the retrieved chunks as `Content:` / `Source:` pairs
//! and asked to finish its reply with a `SOURCES:` line. [`parse_response`]
//! splits a reply at that marker; [`attribute_sources`] then keeps only the
//! claimed sources that were actually retrieved, ranked by retrieval order.
//!
//! A reply without a `SOURCES:` marker is not an error: the whole reply is
//! the answer and the source list is empty.

use crate::generation::Prompt;
use crate::models::RetrievedChunk;

const SYSTEM_INSTRUCTIONS: &str = "You answer questions using only the extracted document parts \
you are given. If the parts do not contain the answer, say that you don't know. Never make up an \
answer. Always finish your reply with a final line of the form \
\"SOURCES: <comma-separated Source values you used>\", leaving it empty after the colon if you \
used none.";

/// Build the prompt for `question` grounded on `context`.
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> Prompt {
    let mut user = String::from("Extracted document parts:\n\n");
    if context.is_empty() {
        user.push_str("(no matching parts were found)\n\n");
    }
    for chunk in context {
        if let Some(title) = &chunk.title {
            user.push_str("Title: ");
            user.push_str(title);
            user.push('\n');
        }
        user.push_str("Content: ");
        user.push_str(chunk.text.trim());
        user.push_str("\nSource: ");
        user.push_str(&chunk.source);
        user.push_str("\n\n");
    }
    user.push_str("Question: ");
    user.push_str(question.trim());
    user.push('\n');

    Prompt {
        system: SYSTEM_INSTRUCTIONS.to_string(),
        user,
    }
}

/// A model reply split into answer text and the sources it claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub answer: String,
    /// Claimed sources in the order the model listed them. Unverified.
    pub sources: Vec<String>,
}

/// Split a raw model reply at its last `SOURCES:` (or `SOURCE:`) line.
///
/// The marker only counts at the start of a line, optionally behind
/// markdown emphasis, heading or bullet characters. A marker word inside a
/// sentence ("the data source: ...") is part of the answer.
pub fn parse_response(raw: &str) -> ParsedResponse {
    match find_sources_line(raw) {
        Some((start, end)) => ParsedResponse {
            answer: clean_answer(&raw[..start]),
            sources: split_source_list(&raw[end..]),
        },
        None => ParsedResponse {
            answer: clean_answer(raw),
            sources: Vec::new(),
        },
    }
}

/// Byte offsets of the last sources line start and of the end of its marker.
fn find_sources_line(raw: &str) -> Option<(usize, usize)> {
    let mut found = None;
    let mut line_start = 0;
    for line in raw.split_inclusive('\n') {
        let body = line.trim_start_matches(|c: char| {
            c.is_whitespace() || matches!(c, '*' | '#' | '-' | '>')
        });
        let lead = line.len() - body.len();
        for marker in ["sources:", "source:"] {
            if starts_with_ignore_case(body, marker) {
                found = Some((line_start, line_start + lead + marker.len()));
                break;
            }
        }
        line_start += line.len();
    }
    found
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn clean_answer(text: &str) -> String {
    let text = text.trim().trim_end_matches(['*', '#']).trim();
    let prefix = "final answer:";
    if starts_with_ignore_case(text, prefix) {
        text[prefix.len()..].trim().to_string()
    } else {
        text.to_string()
    }
}

fn split_source_list(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .map(|token| {
            token.trim_matches(|c: char| {
                matches!(
                    c,
                    '-' | '*'
                        | '•'
                        | '['
                        | ']'
                        | '('
                        | ')'
                        | '<'
                        | '>'
                        | '"'
                        | '\''
                        | '`'
                        | '.'
                        | ';'
                        | ':'
                )
            })
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep the claimed sources that belong to retrieved chunks.
///
/// The result is deduplicated and ordered by the rank of each source's
/// first retrieved chunk, so it never contains an identifier that was not
/// retrieved.
pub fn attribute_sources(claimed: &[String], context: &[RetrievedChunk]) -> Vec<String> {
    let mut ranked: Vec<&str> = Vec::new();
    for chunk in context {
        if !ranked.contains(&chunk.source.as_str()) {
            ranked.push(&chunk.source);
        }
    }

    ranked
        .into_iter()
        .filter(|source| claimed.iter().any(|c| same_source(c, source)))
        .map(str::to_string)
        .collect()
}

fn same_source(a: &str, b: &str) -> bool {
    a == b || a.trim_end_matches('/') == b.trim_end_matches('/')
}
