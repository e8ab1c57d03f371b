//! The Mark V Shaney channel summarizer.
//!
//! Builds a word-level Markov chain over the channel buffer and prints a
//! handful of scrambled sentences. Pure flavor, but a faithful workout for
//! the push/pop handler machinery: it runs as its own frame and hands the
//! client back to the room when done.

use crate::error::HandlerResult;
use crate::network::LineClient;
use crate::session::{Handler, Next};
use crate::state::{ChannelLine, ChannelRoom};
use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const CHAIN_LENGTH: usize = 3;
const MAX_SUMMARY_FAILING: usize = 5;
/// Guard against chains that never reach a terminal key.
const MAX_SENTENCE_WORDS: usize = 1000;

type Key = Vec<String>;

/// One-shot handler that prints the summary and reconnects to the room.
pub struct MarkVShaney {
    client: Arc<LineClient>,
    buffer: Vec<ChannelLine>,
    size: usize,
    room: Arc<ChannelRoom>,
}

impl MarkVShaney {
    pub fn new(
        client: Arc<LineClient>,
        buffer: Vec<ChannelLine>,
        size: usize,
        room: Arc<ChannelRoom>,
    ) -> Self {
        Self {
            client,
            buffer,
            size,
            room,
        }
    }
}

#[async_trait]
impl Handler for MarkVShaney {
    async fn handle(&mut self) -> HandlerResult<Next> {
        let sentences = prepare(&self.buffer);
        let size = self.size.min(sentences.len());
        let starts: Vec<Key> = sentences
            .iter()
            .map(|words| words[..CHAIN_LENGTH - 1].to_vec())
            .collect();
        let stops: HashSet<Key> = sentences
            .iter()
            .map(|words| words[words.len() - CHAIN_LENGTH..].to_vec())
            .collect();
        let chains = create_chains(&sentences);
        let cache = create_summary(size, &starts, &stops, &chains);
        if cache.is_empty() {
            self.client.print("There is nothing worth summarizing.").await?;
        } else {
            let rule = "~".repeat(cache.iter().map(String::len).max().unwrap_or(0));
            self.client.print(&rule).await?;
            for sentence in &cache {
                self.client.print(sentence).await?;
            }
            self.client.print(&rule).await?;
        }
        self.room.connect(&self.client);
        Ok(None)
    }
}

/// Keep only lines long enough to participate in a chain.
fn prepare(buffer: &[ChannelLine]) -> Vec<Vec<String>> {
    buffer
        .iter()
        .map(|line| {
            line.body
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .filter(|words| words.len() >= CHAIN_LENGTH)
        .collect()
}

/// Map every `CHAIN_LENGTH - 1` window to the words that followed it.
fn create_chains(sentences: &[Vec<String>]) -> HashMap<Key, Vec<String>> {
    let mut chains: HashMap<Key, Vec<String>> = HashMap::new();
    for sentence in sentences {
        for window in sentence.windows(CHAIN_LENGTH) {
            let key = window[..CHAIN_LENGTH - 1].to_vec();
            let value = window[CHAIN_LENGTH - 1].clone();
            chains.entry(key).or_default().push(value);
        }
    }
    chains
}

fn create_summary(
    size: usize,
    starts: &[Key],
    stops: &HashSet<Key>,
    chains: &HashMap<Key, Vec<String>>,
) -> Vec<String> {
    let mut cache: Vec<String> = Vec::new();
    for _ in 0..size {
        let mut accepted = None;
        for _ in 0..MAX_SUMMARY_FAILING {
            if let Some(sentence) = create_sentence(starts, stops, chains)
                && !cache.contains(&sentence)
            {
                accepted = Some(sentence);
                break;
            }
        }
        match accepted {
            Some(sentence) => cache.push(sentence),
            None => return cache,
        }
    }
    cache
}

fn create_sentence(
    starts: &[Key],
    stops: &HashSet<Key>,
    chains: &HashMap<Key, Vec<String>>,
) -> Option<String> {
    let mut sentence: Vec<String> = starts.choose(&mut OsRng)?.clone();
    loop {
        let key: Key = sentence[sentence.len().saturating_sub(CHAIN_LENGTH - 1)..].to_vec();
        let next = chains.get(&key)?.choose(&mut OsRng)?.clone();
        sentence.push(next);
        if sentence.len() >= CHAIN_LENGTH && stops.contains(&sentence[sentence.len() - CHAIN_LENGTH..].to_vec()) {
            return Some(sentence.join(" "));
        }
        if sentence.len() > MAX_SENTENCE_WORDS {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(bodies: &[&str]) -> Vec<ChannelLine> {
        bodies
            .iter()
            .map(|body| ChannelLine::new("tester", *body))
            .collect()
    }

    #[test]
    fn short_lines_are_dropped() {
        let sentences = prepare(&lines(&["one two", "one two three", "hi"]));
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0], vec!["one", "two", "three"]);
    }

    #[test]
    fn chains_record_every_continuation() {
        let sentences = prepare(&lines(&["a b c", "a b d"]));
        let chains = create_chains(&sentences);
        let followers = &chains[&vec!["a".to_string(), "b".to_string()]];
        assert_eq!(followers.len(), 2);
        assert!(followers.contains(&"c".to_string()));
        assert!(followers.contains(&"d".to_string()));
    }

    #[test]
    fn single_sentence_reproduces_itself() {
        let sentences = prepare(&lines(&["the quick brown fox"]));
        let starts: Vec<Key> = sentences.iter().map(|w| w[..2].to_vec()).collect();
        let stops: HashSet<Key> = sentences.iter().map(|w| w[w.len() - 3..].to_vec()).collect();
        let chains = create_chains(&sentences);
        let sentence = create_sentence(&starts, &stops, &chains).unwrap();
        assert_eq!(sentence, "the quick brown fox");
    }

    #[test]
    fn summary_gives_up_after_repeated_duplicates() {
        let sentences = prepare(&lines(&["only one line here"]));
        let starts: Vec<Key> = sentences.iter().map(|w| w[..2].to_vec()).collect();
        let stops: HashSet<Key> = sentences.iter().map(|w| w[w.len() - 3..].to_vec()).collect();
        let chains = create_chains(&sentences);
        // asking for many sentences from one deterministic chain stalls at 1
        let cache = create_summary(10, &starts, &stops, &chains);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn empty_buffer_summarizes_to_nothing() {
        let cache = create_summary(0, &[], &HashSet::new(), &HashMap::new());
        assert!(cache.is_empty());
    }
}
