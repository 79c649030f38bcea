//! Blowfish cipher state with the two key schedules bcrypt needs: the
//! standard one and the salted "expensive" variant from Provos and Mazières.
//!
//! A [`CipherState`] belongs to exactly one hash computation. It starts from
//! the fixed pi-digit tables, is keyed in place, and is wiped when dropped.

use zeroize::Zeroize;

use super::constants::{P_INIT, S_INIT};

/// Feistel rounds per block.
pub const ROUNDS: usize = 16;

/// Subkeys in the P-array.
pub const P_WORDS: usize = ROUNDS + 2;

/// Words per S-box.
pub const SBOX_WORDS: usize = 256;

/// Cycles through key material four bytes at a time, wrapping at the end.
struct WordStream<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> WordStream<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Next big-endian word. Empty key material reads as zero bytes, the way
    /// C implementations read an empty string's terminator.
    fn next_word(&mut self) -> u32 {
        let mut word = 0_u32;
        for _ in 0..4 {
            let byte = self.data.get(self.offset).copied().unwrap_or(0);
            word = (word << 8) | u32::from(byte);
            self.offset += 1;
            if self.offset >= self.data.len() {
                self.offset = 0;
            }
        }
        word
    }
}

pub struct CipherState {
    p: [u32; P_WORDS],
    s: [[u32; SBOX_WORDS]; 4],
}

impl CipherState {
    /// Fresh state loaded with the Blowfish initialization constants.
    pub fn new() -> Self {
        Self {
            p: P_INIT,
            s: S_INIT,
        }
    }

    fn f(&self, x: u32) -> u32 {
        let [b0, b1, b2, b3] = x.to_be_bytes();
        let h = self.s[0][usize::from(b0)].wrapping_add(self.s[1][usize::from(b1)]);
        (h ^ self.s[2][usize::from(b2)]).wrapping_add(self.s[3][usize::from(b3)])
    }

    /// Enciphers one 64-bit block given as its left and right halves.
    pub fn encipher(&self, mut l: u32, mut r: u32) -> (u32, u32) {
        for i in (0..ROUNDS).step_by(2) {
            l ^= self.p[i];
            r ^= self.f(l);
            r ^= self.p[i + 1];
            l ^= self.f(r);
        }

        l ^= self.p[ROUNDS];
        r ^= self.p[ROUNDS + 1];

        (r, l)
    }

    /// Enciphers the block stored at `halves[offset]` and `halves[offset + 1]`
    /// in place. Panics if `offset + 1` is out of bounds.
    pub(crate) fn encipher_block(&self, halves: &mut [u32], offset: usize) {
        let (l, r) = self.encipher(halves[offset], halves[offset + 1]);
        halves[offset] = l;
        halves[offset + 1] = r;
    }

    fn xor_key(&mut self, key: &[u8]) {
        let mut stream = WordStream::new(key);
        for word in &mut self.p {
            *word ^= stream.next_word();
        }
    }

    /// Re-derives P and S by chaining encipherments, folding salt words into
    /// each block first when a salt stream is given.
    fn expand(&mut self, mut salt: Option<WordStream<'_>>) {
        let mut l = 0_u32;
        let mut r = 0_u32;

        for i in (0..P_WORDS).step_by(2) {
            if let Some(stream) = salt.as_mut() {
                l ^= stream.next_word();
                r ^= stream.next_word();
            }
            (l, r) = self.encipher(l, r);
            self.p[i] = l;
            self.p[i + 1] = r;
        }

        for sbox in 0..4 {
            for i in (0..SBOX_WORDS).step_by(2) {
                if let Some(stream) = salt.as_mut() {
                    l ^= stream.next_word();
                    r ^= stream.next_word();
                }
                (l, r) = self.encipher(l, r);
                self.s[sbox][i] = l;
                self.s[sbox][i + 1] = r;
            }
        }
    }

    /// Standard Blowfish key schedule.
    pub fn key_schedule(&mut self, key: &[u8]) {
        self.xor_key(key);
        self.expand(None);
    }

    /// Salted key schedule: the same P-array keying, with salt words mixed
    /// into every block before it is enciphered.
    pub fn enhanced_key_schedule(&mut self, salt: &[u8], key: &[u8]) {
        self.xor_key(key);
        self.expand(Some(WordStream::new(salt)));
    }
}

impl Default for CipherState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CipherState {
    fn drop(&mut self) {
        // Keyed state is derived from the password.
        self.p.zeroize();
        self.s.zeroize();
    }
}
