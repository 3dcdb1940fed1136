use std::collections::{BTreeMap, VecDeque};
use crate::core::error::{Error, ErrorKind, Result};

const ROOT: usize = 0;

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<char, usize>,
    failure: usize,
    /// Indices into `patterns` of every pattern ending here, ascending.
    output: Vec<usize>,
}

/// Aho-Corasick automaton over a fixed pattern set. Finds every occurrence of
/// every pattern in one pass, overlapping ones included.
#[derive(Debug)]
pub struct AhoCorasick {
    patterns: Vec<String>,
    nodes: Vec<Node>,
}

impl AhoCorasick {
    /// Builds the automaton. Duplicate patterns collapse into one; an empty
    /// pattern is rejected.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "search patterns must be non-empty".to_string(),
                ));
            }
            if !unique.iter().any(|p| p == pattern) {
                unique.push(pattern.to_string());
            }
        }

        let mut automaton = AhoCorasick {
            patterns: unique,
            nodes: vec![Node::default()],
        };
        automaton.build_trie();
        automaton.build_failure_links();
        Ok(automaton)
    }

    fn build_trie(&mut self) {
        for (index, pattern) in self.patterns.iter().enumerate() {
            let mut node = ROOT;
            for c in pattern.chars() {
                let existing = self.nodes[node].children.get(&c).copied();
                node = match existing {
                    Some(child) => child,
                    None => {
                        let child = self.nodes.len();
                        self.nodes.push(Node::default());
                        self.nodes[node].children.insert(c, child);
                        child
                    }
                };
            }
            self.nodes[node].output.push(index);
        }
    }

    /// BFS from the root's children. Each node's failure target is the longest
    /// proper suffix of its path that is also a trie path; its output absorbs
    /// the failure target's output.
    fn build_failure_links(&mut self) {
        let mut queue: VecDeque<usize> = self.nodes[ROOT].children.values().copied().collect();
        for &child in &queue {
            self.nodes[child].failure = ROOT;
        }

        while let Some(r) = queue.pop_front() {
            let edges: Vec<(char, usize)> =
                self.nodes[r].children.iter().map(|(c, s)| (*c, *s)).collect();

            for (c, s) in edges {
                queue.push_back(s);

                let mut state = self.nodes[r].failure;
                while state != ROOT && !self.nodes[state].children.contains_key(&c) {
                    state = self.nodes[state].failure;
                }
                let failure = self.nodes[state].children.get(&c).copied().unwrap_or(ROOT);
                self.nodes[s].failure = failure;

                let inherited = self.nodes[failure].output.clone();
                let output = &mut self.nodes[s].output;
                output.extend(inherited);
                output.sort_unstable();
                output.dedup();
            }
        }
    }

    fn next_state(&self, mut state: usize, c: char) -> usize {
        loop {
            if let Some(&child) = self.nodes[state].children.get(&c) {
                return child;
            }
            if state == ROOT {
                return ROOT;
            }
            state = self.nodes[state].failure;
        }
    }

    /// Every `(end_position, pattern)` occurrence in `text`. Positions are
    /// character indices of the last matched character.
    pub fn search(&self, text: &str) -> Vec<(usize, &str)> {
        let mut matches = Vec::new();
        let mut state = ROOT;

        for (position, c) in text.chars().enumerate() {
            state = self.next_state(state, c);
            for &index in &self.nodes[state].output {
                matches.push((position, self.patterns[index].as_str()));
            }
        }

        matches
    }

    /// True as soon as any pattern occurs in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        let mut state = ROOT;
        for c in text.chars() {
            state = self.next_state(state, c);
            if !self.nodes[state].output.is_empty() {
                return true;
            }
        }
        false
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn state_count(&self) -> usize {
        self.nodes.len()
    }
}
