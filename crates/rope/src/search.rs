use crate::node::Leaf;

/// Where a pattern occurrence starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub offset: usize,
    pub line: usize,
}

/// Knuth-Morris-Pratt automaton for one pattern.
pub struct Kmp<'p> {
    pattern: &'p [u8],
    // failure[i]: length of the longest proper prefix of pattern[..=i] that
    // is also its suffix
    failure: Vec<usize>,
}

impl<'p> Kmp<'p> {
    pub fn new(pattern: &'p [u8]) -> Self {
        let mut failure = vec![0; pattern.len()];
        let mut matched = 0;
        for i in 1..pattern.len() {
            while matched > 0 && pattern[i] != pattern[matched] {
                matched = failure[matched - 1];
            }
            if pattern[i] == pattern[matched] {
                matched += 1;
            }
            failure[i] = matched;
        }
        Kmp { pattern, failure }
    }

    // Advance the automaton from `state` by one input byte.
    fn step(&self, mut state: usize, byte: u8) -> usize {
        while state > 0 && byte != self.pattern[state] {
            state = self.failure[state - 1];
        }
        if byte == self.pattern[state] {
            state += 1;
        }
        state
    }

    /// Run one automaton walk over `leaves`, carrying its state across leaf
    /// boundaries.
    ///
    /// The first leaf is scanned from local offset `skip`; `base_offset` and
    /// `base_newlines` describe the text before that first leaf.
    pub fn find_in<'a>(
        &self,
        leaves: impl Iterator<Item = &'a Leaf>,
        skip: usize,
        base_offset: usize,
        base_newlines: usize,
    ) -> Option<Match> {
        if self.pattern.is_empty() {
            return None;
        }
        let mut state = 0;
        let mut processed = base_offset;
        let mut newlines = base_newlines;
        let mut skip = skip;

        for leaf in leaves {
            let bytes = leaf.as_bytes();
            for (i, &byte) in bytes.iter().enumerate().skip(skip) {
                state = self.step(state, byte);
                if state == self.pattern.len() {
                    let offset = processed + i + 1 - self.pattern.len();
                    return Some(Match {
                        offset,
                        line: self.line_of(offset, processed, newlines, bytes),
                    });
                }
            }
            skip = 0;
            processed += bytes.len();
            newlines += leaf.newlines();
        }
        None
    }

    // Line of a match start, given the leaf where the match completed.
    fn line_of(&self, start: usize, leaf_start: usize, newlines: usize, leaf: &[u8]) -> usize {
        if start >= leaf_start {
            newlines + bytecount::count(&leaf[..start - leaf_start], b'\n')
        } else {
            // the match began in earlier leaves; those bytes are a pattern prefix
            newlines - bytecount::count(&self.pattern[..leaf_start - start], b'\n')
        }
    }
}
