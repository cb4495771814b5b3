use std::{collections::HashMap, io::Write};

use smallvec::{smallvec, SmallVec};

use crate::format::{Entry, MAX_MATCH, MIN_MATCH, WINDOW_SIZE};

use super::{LzssBackend, ProgressFn, Stage};

/// One or two entries emitted by a single parsing step
pub(super) type Step = SmallVec<[Entry; 2]>;

/// A back-reference to earlier data in the chunk
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct MoveBack {
    /// number of bytes matched
    pub size: usize,
    /// offset of the match start from the start of the chunk
    pub distance: usize,
}

impl MoveBack {
    fn new(size: usize, distance: usize) -> Self {
        Self { size, distance }
    }
}

impl From<MoveBack> for Entry {
    fn from(m: MoveBack) -> Self {
        Entry::lz(m.distance, m.size)
    }
}

pub(crate) trait MatchFinder {
    /// Find the longest match for `data[pos..]` that starts before `pos` and in the
    /// first `WINDOW_SIZE` bytes. Of equally long matches, the earliest is returned.
    fn find(&self, data: &[u8], pos: usize) -> Option<MoveBack>;
}

/// Naive search through every position of the window, earliest first
#[derive(Debug, Clone, Copy)]
pub(crate) struct NaiveBrute;

impl MatchFinder for NaiveBrute {
    fn find(&self, data: &[u8], pos: usize) -> Option<MoveBack> {
        let mut best: Option<MoveBack> = None;

        for start in 0..pos.min(WINDOW_SIZE) {
            let size = match_length(data, start, pos);
            if size >= MIN_MATCH && best.map_or(true, |b| size > b.size) {
                best = Some(MoveBack::new(size, start));
                if size == MAX_MATCH {
                    break;
                }
            }
        }

        best
    }
}

/// Positions chained together by their first two bytes
#[derive(Debug, Clone)]
pub(crate) struct HashChain {
    /// previous position with the same two byte prefix, or `NONE`
    prev: Box<[usize]>,
}

impl HashChain {
    const NONE: usize = usize::MAX;

    pub(crate) fn new(data: &[u8]) -> Self {
        // only prefixes that occur in this chunk get a head
        let mut head: HashMap<[u8; 2], usize> = HashMap::with_capacity(data.len().min(1 << 16));
        let mut prev = vec![Self::NONE; data.len()];

        for (pos, pair) in data.windows(MIN_MATCH).enumerate() {
            let key = [pair[0], pair[1]];
            if let Some(last) = head.insert(key, pos) {
                prev[pos] = last;
            }
        }

        Self { prev: prev.into() }
    }
}

impl MatchFinder for HashChain {
    fn find(&self, data: &[u8], pos: usize) -> Option<MoveBack> {
        let mut best: Option<MoveBack> = None;

        // every position in the chain shares the first two bytes at `pos`,
        // so only positions in the chain can be a match of `MIN_MATCH` or more.
        // The chain runs from the nearest position to the earliest, so an equal
        // match further down the chain replaces the best one.
        let mut start = self.prev.get(pos).copied().unwrap_or(Self::NONE);
        while start != Self::NONE {
            if start < WINDOW_SIZE {
                let size = match_length(data, start, pos);
                if best.map_or(true, |b| size >= b.size) {
                    best = Some(MoveBack::new(size, start));
                }
            }
            start = self.prev[start];
        }

        best.filter(|m| m.size >= MIN_MATCH)
    }
}

/// Length of the common prefix of `data[start..]` and `data[pos..]`, up to `MAX_MATCH`.
/// The match may run on past `pos` into the bytes it is matching.
fn match_length(data: &[u8], start: usize, pos: usize) -> usize {
    data[start..]
        .iter()
        .zip(&data[pos..])
        .take(MAX_MATCH)
        .take_while(|(s, d)| s == d)
        .count()
}

/// Compress `data` into a Vec of raw and lz `Entry`s.
///
/// Each match is checked against the match at the next byte. If that one is
/// longer, the current byte is emitted raw and the longer match is used instead.
/// Debugging information will be printed to `log` if present.
pub(crate) fn compress_chunk(
    data: &[u8],
    backend: LzssBackend,
    log: &mut Option<&mut dyn Write>,
    progress: &mut Option<ProgressFn>,
) -> std::io::Result<Vec<Entry>> {
    let chain;
    let finder = match backend {
        LzssBackend::Brute => &NaiveBrute as &dyn MatchFinder,
        LzssBackend::HashChain => {
            chain = HashChain::new(data);
            &chain as &dyn MatchFinder
        }
    };

    let mut entries = Vec::with_capacity(data.len());
    let mut pos = 0;

    while pos < data.len() {
        let (step, consumed) = lazy_step(data, pos, finder);

        if let Some(wtr) = log.as_mut() {
            for entry in &step {
                writeln!(wtr, "{:04x} - {}", pos, entry)?;
            }
        }

        entries.extend(step);
        pos += consumed;

        if let Some(report) = progress.as_mut() {
            report(Stage::Encoding.at(pos, data.len()));
        }
    }

    Ok(entries)
}

/// Parse the entries at `pos`, and return them with the number of input bytes they cover
fn lazy_step(data: &[u8], pos: usize, finder: &dyn MatchFinder) -> (Step, usize) {
    match finder.find(data, pos) {
        None => (smallvec![Entry::Raw(data[pos])], 1),
        Some(current) => match finder.find(data, pos + 1) {
            Some(next) if next.size > current.size => {
                (smallvec![Entry::Raw(data[pos]), next.into()], next.size + 1)
            }
            _ => (smallvec![current.into()], current.size),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::Progress;

    fn encode(data: &[u8], backend: LzssBackend) -> Vec<Entry> {
        compress_chunk(data, backend, &mut None, &mut None).unwrap()
    }

    fn pseudo_random(len: usize, mut seed: u32, alphabet: u32) -> Vec<u8> {
        (0..len)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((seed >> 16) % alphabet) as u8
            })
            .collect()
    }

    #[test]
    fn no_match_under_min() {
        assert_eq!(NaiveBrute.find(b"abca", 3), None);
        assert_eq!(HashChain::new(b"abca").find(b"abca", 3), None);
    }

    #[test]
    fn earliest_of_equal_matches() {
        let data = b"xyQxyRxy";
        assert_eq!(NaiveBrute.find(data, 6), Some(MoveBack::new(2, 0)));
        assert_eq!(HashChain::new(data).find(data, 6), Some(MoveBack::new(2, 0)));
    }

    #[test]
    fn longest_beats_earliest() {
        let data = b"abXabcYabc";
        let m = NaiveBrute.find(data, 7).unwrap();
        assert_eq!(m, MoveBack::new(3, 3));
    }

    #[test]
    fn self_overlapping_match() {
        let data = [7u8; 30];
        assert_eq!(NaiveBrute.find(&data, 1), Some(MoveBack::new(MAX_MATCH, 0)));
        assert_eq!(NaiveBrute.find(&data, 25), Some(MoveBack::new(5, 0)));
    }

    #[test]
    fn window_limit() {
        // the same pair at the end of the data, and at `at` earlier on
        let with_pair_at = |at: usize| {
            let mut data: Vec<u8> = (0..WINDOW_SIZE + 4).map(|i| (i % 200) as u8 + 3).collect();
            let len = data.len();
            data[at] = 1;
            data[at + 1] = 2;
            data[len - 2] = 1;
            data[len - 1] = 2;
            data
        };

        // a match can not start at or after `WINDOW_SIZE`
        let data = with_pair_at(WINDOW_SIZE);
        let pos = data.len() - 2;
        assert_eq!(NaiveBrute.find(&data, pos), None);
        assert_eq!(HashChain::new(&data).find(&data, pos), None);

        let data = with_pair_at(WINDOW_SIZE - 1);
        let m = NaiveBrute.find(&data, pos).unwrap();
        assert_eq!(m, MoveBack::new(2, crate::format::MAX_DISTANCE));
        assert_eq!(HashChain::new(&data).find(&data, pos), Some(m));
    }

    #[test]
    fn lazy_prefers_longer_next_match() {
        // at 9 "bcd" matches offset 0 for 3 bytes, at 10 "cdefg" matches offset 4 for 5
        let data = b"bcdXcdefgbcdefg";
        let entries = encode(data, LzssBackend::Brute);
        let pos = 10;
        let mut decoded = 0;
        let idx = entries
            .iter()
            .position(|e| {
                let at = decoded;
                decoded += e.size();
                at == pos
            })
            .unwrap();
        assert_eq!(entries[idx - 1], Entry::Raw(b'b'));
        assert_eq!(entries[idx], Entry::lz(4, 5));
    }

    #[test]
    fn backends_agree() {
        for &(len, seed, alphabet) in &[(600, 1, 2), (3000, 7, 4), (9000, 3, 16), (5000, 9, 256)] {
            let data = pseudo_random(len, seed, alphabet);
            let chain = HashChain::new(&data);
            for pos in 0..data.len() {
                assert_eq!(NaiveBrute.find(&data, pos), chain.find(&data, pos), "at {}", pos);
            }
        }
    }

    #[test]
    fn progress_reaches_end() {
        let data = b"abababababcdcdcdcd";
        let mut last = None;
        let mut report = |p: Progress| last = Some(p);
        let mut progress: Option<ProgressFn> = Some(&mut report);
        compress_chunk(data, LzssBackend::Brute, &mut None, &mut progress).unwrap();
        let last = last.unwrap();
        assert_eq!((last.done, last.total), (data.len(), data.len()));
    }
}
