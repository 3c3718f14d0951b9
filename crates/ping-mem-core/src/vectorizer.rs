//! Deterministic feature-hashing vectorizer (C1).
//!
//! Pure, dependency-free (beyond SHA-256) text → fixed-dimension unit-norm
//! vector. No machine learning is involved; [`vectorize`] produces
//! bit-identical output for the same input on any platform, which is what
//! lets it stand in as the always-available embedding provider (C2) and
//! makes `vectorize(x) == vectorize(x)` a property test rather than an
//! aspiration.
//!
//! # Algorithm
//!
//! 1. Lowercase the input; replace every character that is neither a word
//!    character (`[A-Za-z0-9_]`) nor whitespace with a space; collapse
//!    runs of whitespace; split into tokens.
//! 2. Generate every 1-, 2-, and 3-gram over the token sequence, joining
//!    the tokens of an n-gram with `_`.
//! 3. For each n-gram, hash it with SHA-256 and read the first four bytes
//!    as a big-endian signed 32-bit integer `h`. Bucket `idx = |h| mod D`.
//!    Accumulate `+1` into that bucket if `h >= 0`, else `-1`.
//! 4. L2-normalize the accumulator. A text that produces no tokens yields
//!    the all-zero vector unchanged (normalizing a zero vector is a
//!    division by zero we explicitly skip — pass-through, not NaN).

use sha2::{Digest, Sha256};

/// Default vector dimensionality used when nothing overrides it.
pub const DEFAULT_DIMS: usize = 768;

/// Vectorize `text` into an L2-unit vector of length `dims`.
pub fn vectorize(text: &str, dims: usize) -> Vec<f32> {
    let mut acc = vec![0f32; dims.max(1)];
    let tokens = tokenize(text);

    for n in 1..=3usize {
        if tokens.len() < n {
            continue;
        }
        for window in tokens.windows(n) {
            let ngram = window.join("_");
            let (idx, sign) = hash_bucket(&ngram, acc.len());
            acc[idx] += sign;
        }
    }

    normalize_in_place(&mut acc);
    acc
}

/// Split text into lowercase word tokens, same tokenization the BM25
/// index (C4) uses minus the length-1 drop rule (n-grams over
/// single-character tokens are still meaningful hash inputs here).
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn hash_bucket(ngram: &str, dims: usize) -> (usize, f32) {
    let digest = Sha256::digest(ngram.as_bytes());
    let h = i32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let idx = (h.unsigned_abs() as usize) % dims;
    let sign = if h >= 0 { 1.0 } else { -1.0 };
    (idx, sign)
}

fn normalize_in_place(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        let a = vectorize("The quick brown fox", DEFAULT_DIMS);
        let b = vectorize("The quick brown fox", DEFAULT_DIMS);
        assert_eq!(a, b);
    }

    #[test]
    fn unit_norm() {
        let v = vectorize("hello world, this is a test sentence", 256);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let v = vectorize("", 128);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn punctuation_only_is_zero_vector() {
        let v = vectorize("!!! ... ???", 128);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn correct_dimensionality() {
        let v = vectorize("some sample text", 384);
        assert_eq!(v.len(), 384);
    }

    #[test]
    fn distinct_texts_differ() {
        let a = vectorize("machine learning models", DEFAULT_DIMS);
        let b = vectorize("kubernetes deployment manifests", DEFAULT_DIMS);
        assert_ne!(a, b);
    }

    #[test]
    fn case_insensitive() {
        let a = vectorize("Hello World", DEFAULT_DIMS);
        let b = vectorize("hello world", DEFAULT_DIMS);
        assert_eq!(a, b);
    }
}
