//! Adler-32 arithmetic with a byte-by-byte sliding window.
//!
//! The checksum is `(s2 << 16) | s1` where `s1` is one plus the sum of the window bytes and
//! `s2` is the sum of all intermediate `s1` values, both modulo [`MOD`].

use log::trace;

use super::{RollingChecksum, RollingError};

/// The largest prime smaller than 2^16.
pub const MOD: u32 = 65521;

/// The largest `n` such that `255 * n * (n + 1) / 2 + (n + 1) * (MOD - 1)` still fits in a `u32`,
/// i.e. how many bytes can be summed before `s1`/`s2` have to be reduced.
pub const NMAX: usize = 5552;

/// Sliding window over the bytes last checksummed, together with the partial sums of the
/// checksum.
///
/// The window is a ring buffer: its length is fixed at creation and `head` points at the
/// oldest byte.
#[derive(Debug, Clone)]
pub struct WindowState {
    window: Box<[u8]>,
    head: usize,
    s1: u32,
    s2: u32,
}

/// Computes the checksum of `bytes` and returns it along with a [`WindowState`] that owns a
/// copy of `bytes` and can be slid forward.
///
/// ```
/// use rolling_window_diff::rolling_checksum::adler32::full_checksum;
///
/// let (checksum, _) = full_checksum(b"Wikipedia");
/// assert_eq!(checksum, 0x11E6_0398);
///
/// let (checksum, state) = full_checksum(&[]);
/// assert_eq!(checksum, 1);
/// assert!(state.is_empty());
/// ```
pub fn full_checksum(bytes: &[u8]) -> (u32, WindowState) {
    let (s1, s2) = sum_chunks(bytes);
    trace!("checksummed {} bytes: s1 {} s2 {}", bytes.len(), s1, s2);

    let state = WindowState {
        window: Box::from(bytes),
        head: 0,
        s1,
        s2,
    };
    (state.checksum(), state)
}

/// Shorthand for the checksum part of [`full_checksum`], without keeping a copy of the window.
pub fn checksum(bytes: &[u8]) -> u32 {
    let (s1, s2) = sum_chunks(bytes);
    combine(s1, s2)
}

fn sum_chunks(bytes: &[u8]) -> (u32, u32) {
    let mut s1: u32 = 1;
    let mut s2: u32 = 0;

    // no reduction inside a chunk - NMAX guarantees neither sum overflows
    for chunk in bytes.chunks(NMAX) {
        for &byte in chunk {
            s1 += u32::from(byte);
            s2 += s1;
        }
        s1 %= MOD;
        s2 %= MOD;
    }
    (s1, s2)
}

fn combine(s1: u32, s2: u32) -> u32 {
    (s2 << 16) | s1
}

impl WindowState {
    pub fn checksum(&self) -> u32 {
        combine(self.s1, self.s2)
    }

    /// The `(s1, s2)` partial sums, both always below [`MOD`].
    pub fn sums(&self) -> (u32, u32) {
        (self.s1, self.s2)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// The bytes currently inside the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = u8> + '_ {
        let (newer, older) = self.window.split_at(self.head);
        older.iter().chain(newer.iter()).copied()
    }

    /// Drops the oldest byte of the window, appends `new_byte` and returns the updated
    /// checksum.
    ///
    /// Sliding an empty window is an error and leaves the state untouched.
    pub fn slide_by(&mut self, new_byte: u8) -> Result<u32, RollingError> {
        let len = self.window.len();
        if len == 0 {
            return Err(RollingError::EmptyWindow);
        }

        let evicted = std::mem::replace(&mut self.window[self.head], new_byte);
        self.head += 1;
        if self.head == len {
            self.head = 0;
        }

        let x = u32::from(evicted);
        let mut s1 = self.s1 + u32::from(new_byte);
        if s1 < x {
            s1 += MOD;
        }
        self.s1 = (s1 - x) % MOD;

        // s2' = s2 + s1' - len * x - 1, kept non-negative by adding MOD until the
        // subtraction can't underflow
        let modulus = u64::from(MOD);
        let b = len as u64 * u64::from(x) + 1;
        let mut a = u64::from(self.s2) + u64::from(self.s1);
        while b > a {
            a += modulus;
        }
        self.s2 = ((a - b) % modulus) as u32;

        Ok(self.checksum())
    }
}

impl RollingChecksum for WindowState {
    type ChecksumType = u32;

    fn new(initial_window: &[u8]) -> Self {
        full_checksum(initial_window).1
    }

    fn checksum(&self) -> Self::ChecksumType {
        WindowState::checksum(self)
    }

    fn window_len(&self) -> usize {
        self.len()
    }

    fn slide_by(&mut self, new_byte: u8) -> Result<Self::ChecksumType, RollingError> {
        WindowState::slide_by(self, new_byte)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    /// Deterministic pseudo random bytes, good enough to hit every byte value.
    fn noise(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect()
    }

    /// Reduces after every byte instead of once per NMAX chunk.
    fn bytewise_checksum(bytes: &[u8]) -> u32 {
        let mut s1 = 1;
        let mut s2 = 0;
        for &byte in bytes {
            s1 = (s1 + u32::from(byte)) % MOD;
            s2 = (s2 + s1) % MOD;
        }
        (s2 << 16) | s1
    }

    fn reference(bytes: &[u8]) -> u32 {
        adler32::adler32(bytes).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let (checksum, state) = full_checksum(&[]);
        assert_eq!(checksum, 1);
        assert_eq!(state.sums(), (1, 0));
        assert_eq!(state.len(), 0);
    }

    #[test]
    fn test_known_vector() {
        let (checksum, state) = full_checksum(b"Wikipedia");
        assert_eq!(checksum, 0x11E6_0398);
        assert_eq!(state.checksum(), checksum);
        assert_eq!(checksum, reference(b"Wikipedia"));
    }

    #[test]
    fn test_sliding_an_empty_window_fails() {
        let (_, mut state) = full_checksum(&[]);
        assert_eq!(state.slide_by(42), Err(RollingError::EmptyWindow));
        assert_eq!(state.checksum(), 1);
        assert_eq!(state.len(), 0);
    }

    #[test_case(NMAX; "exactly one chunk")]
    #[test_case(NMAX + 1; "one byte into the second chunk")]
    #[test_case(2 * NMAX + 3; "three chunks")]
    fn test_chunk_boundaries(len: usize) {
        for fill in [1u8, 0xFF] {
            let data = vec![fill; len];
            let (checksum, _) = full_checksum(&data);
            assert_eq!(checksum, bytewise_checksum(&data));
            assert_eq!(checksum, reference(&data));
            assert_eq!(checksum, super::checksum(&data));
        }
    }

    #[test_case(1; "single byte window")]
    #[test_case(2; "two byte window")]
    #[test_case(7; "odd window")]
    #[test_case(64; "power of two window")]
    #[test_case(NMAX + 1; "window wider than a chunk")]
    fn test_slide_matches_full_checksum(window_len: usize) {
        let data = noise(window_len + 700, window_len as u32);

        let (mut checksum, mut state) = full_checksum(&data[..window_len]);
        for start in 1..=data.len() - window_len {
            let expected = full_checksum(&data[start..start + window_len]).0;
            assert_eq!(checksum, reference(&data[start - 1..start - 1 + window_len]));
            checksum = state.slide_by(data[start + window_len - 1]).unwrap();
            assert_eq!(checksum, expected, "window starting at {}", start);
        }
    }

    #[test]
    fn test_slide_over_whole_input_for_every_window_len() {
        let data = noise(96, 7);
        for window_len in 1..=data.len() {
            let (_, mut state) = full_checksum(&data[..window_len]);
            for end in window_len..data.len() {
                let checksum = state.slide_by(data[end]).unwrap();
                assert_eq!(checksum, full_checksum(&data[end + 1 - window_len..=end]).0);
            }
        }
    }

    #[test]
    fn test_slide_between_extreme_bytes() {
        // evicting 0xFF while admitting 0x00 drives both sums towards underflow
        let mut data = vec![0xFF; 300];
        data.extend(vec![0x00; 300]);
        data.extend(vec![0xFF; 300]);

        for window_len in [1, 3, 255, 300] {
            let (_, mut state) = full_checksum(&data[..window_len]);
            for end in window_len..data.len() {
                let checksum = state.slide_by(data[end]).unwrap();
                assert_eq!(checksum, bytewise_checksum(&data[end + 1 - window_len..=end]));
                let (s1, s2) = state.sums();
                assert!(s1 < MOD && s2 < MOD);
            }
        }
    }

    #[test]
    fn test_slide_window_much_longer_than_modulus() {
        let window_len = 3 * MOD as usize;
        let mut data = vec![0xFF; window_len];
        data.extend_from_slice(&[0, 1, 2, 0xFE]);

        let (_, mut state) = full_checksum(&data[..window_len]);
        for end in window_len..data.len() {
            let checksum = state.slide_by(data[end]).unwrap();
            assert_eq!(checksum, reference(&data[end + 1 - window_len..=end]));
        }
    }

    #[test]
    fn test_rolling_stability() {
        let data = noise(200, 99);
        let window_len = 50;

        let (_, mut state) = full_checksum(&data[..window_len]);
        let mut checksum = 0;
        for &byte in &data[window_len..2 * window_len] {
            checksum = state.slide_by(byte).unwrap();
        }

        assert_eq!(checksum, full_checksum(&data[window_len..2 * window_len]).0);
        assert!(state.window().eq(data[window_len..2 * window_len].iter().copied()));
    }

    #[test]
    fn test_window_len_is_constant() {
        let data = noise(40, 3);
        let (_, mut state) = full_checksum(&data[..9]);
        for (slides, &byte) in data[9..].iter().enumerate() {
            state.slide_by(byte).unwrap();
            assert_eq!(state.len(), 9);
            let start = slides + 1;
            assert_eq!(state.window().collect::<Vec<_>>(), data[start..start + 9]);
        }
    }

    #[test]
    fn test_independent_states_do_not_interfere() {
        let data = noise(64, 11);
        let (_, mut first) = full_checksum(&data[..16]);
        let mut second = first.clone();

        first.slide_by(data[16]).unwrap();
        assert_eq!(second.checksum(), full_checksum(&data[..16]).0);
        assert_eq!(second.slide_by(data[16]).unwrap(), first.checksum());
    }

    #[test]
    fn test_rolling_checksum_trait() {
        let data = b"rolling in the diff";
        let mut state = <WindowState as RollingChecksum>::new(&data[..4]);
        assert_eq!(state.window_len(), 4);
        assert_eq!(RollingChecksum::checksum(&state), reference(&data[..4]));
        assert_eq!(
            RollingChecksum::slide_by(&mut state, data[4]),
            Ok(reference(&data[1..5]))
        );
    }
}
