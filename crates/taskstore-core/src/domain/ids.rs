//! Identifiers and storage keys.
//!
//! # tsid
//! 13 文字の固定長・ソート可能な base-32 文字列です。
//! 値は `((millis - EPOCH_MS) << 22) | counter` で、同一ミリ秒内は counter で順序付けます。
//! 固定長なので文字列の辞書順と数値順が一致します。
//!
//! # キー空間
//! - `t-{kind}-{tsid}`  task
//! - `g-{group}-{tsid}` group index (value = task key)
//! - `e-{kind}-{tsid}`  failed task
//! - `o-{kind}-{owner}` owner membership (value = nil)
//! - `f-{owner}-{kind}` offset (value = task id)

use std::fmt;

use crate::error::StoreError;

/// 2025-01-01T00:00:00+03:00 in Unix milliseconds.
pub const EPOCH_MS: i64 = 1_735_678_800_000;

/// Low bits reserved for the per-millisecond counter.
pub const COUNTER_BITS: u32 = 22;

pub const TSID_LEN: usize = 13;

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Key namespace prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    Task,
    Group,
    Error,
    Owner,
    Offset,
}

impl Prefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Prefix::Task => "t",
            Prefix::Group => "g",
            Prefix::Error => "e",
            Prefix::Owner => "o",
            Prefix::Offset => "f",
        }
    }

    /// `"{prefix}-"`: the whole namespace.
    pub fn scan(self) -> String {
        format!("{}-", self.as_str())
    }

    /// `"{prefix}-{part}-"`: one kind, group or owner inside the namespace.
    pub fn scan_part(self, part: &str) -> String {
        format!("{}-{}-", self.as_str(), part)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-sortable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tsid(u64);

impl Tsid {
    /// Build from a Unix millisecond timestamp and counter.
    ///
    /// Timestamps before the epoch saturate to zero.
    pub fn from_parts(unix_ms: i64, counter: u32) -> Self {
        let since_epoch = unix_ms.saturating_sub(EPOCH_MS).max(0) as u64;
        let counter = u64::from(counter) & ((1 << COUNTER_BITS) - 1);
        Tsid((since_epoch << COUNTER_BITS) | counter)
    }

    pub fn from_raw(raw: u64) -> Self {
        Tsid(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn millis_since_epoch(self) -> u64 {
        self.0 >> COUNTER_BITS
    }

    pub fn counter(self) -> u32 {
        (self.0 & ((1 << COUNTER_BITS) - 1)) as u32
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != TSID_LEN {
            return None;
        }
        s.bytes().try_fold(0u64, |acc, c| {
            let digit = ALPHABET.iter().position(|&a| a == c)? as u64;
            Some((acc << 5) | digit)
        })
        .map(Tsid)
    }
}

impl fmt::Display for Tsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; TSID_LEN];
        for (i, slot) in buf.iter_mut().enumerate() {
            let shift = 5 * (TSID_LEN - 1 - i);
            *slot = ALPHABET[((self.0 >> shift) & 0b11111) as usize];
        }
        // ALPHABET is ASCII
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

pub fn task_key(kind: &str, tsid: &str) -> String {
    format!("{}-{kind}-{tsid}", Prefix::Task)
}

pub fn group_key(group: &str, tsid: &str) -> String {
    format!("{}-{group}-{tsid}", Prefix::Group)
}

pub fn owner_key(kind: &str, owner: &str) -> String {
    format!("{}-{kind}-{owner}", Prefix::Owner)
}

pub fn offset_key(owner: &str, kind: &str) -> String {
    format!("{}-{owner}-{kind}", Prefix::Offset)
}

/// A parsed `prefix-part-tail` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParts<'a> {
    pub prefix: &'a str,
    pub part: &'a str,
    pub tail: &'a str,
}

/// Split a key into exactly three `-`-separated parts.
pub fn split_key(key: &str) -> Option<KeyParts<'_>> {
    let mut it = key.split('-');
    let parts = (it.next()?, it.next()?, it.next()?);
    if it.next().is_some() {
        return None;
    }
    Some(KeyParts {
        prefix: parts.0,
        part: parts.1,
        tail: parts.2,
    })
}

/// `t-{kind}-{tsid}` -> `g-{group}-{tsid}`.
pub fn group_key_for(id: &str, group: &str) -> Result<String, StoreError> {
    let parts = split_key(id).ok_or_else(|| StoreError::MalformedKey(id.to_string()))?;
    Ok(group_key(group, parts.tail))
}

/// `t-{kind}-{tsid}` -> `e-{kind}-{tsid}`.
pub fn error_id_for(id: &str) -> String {
    match id.strip_prefix(Prefix::Task.as_str()) {
        Some(rest) => format!("{}{rest}", Prefix::Error),
        None => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsid_is_fixed_width_and_ordered() {
        let a = Tsid::from_parts(EPOCH_MS + 1_000, 1).to_string();
        let b = Tsid::from_parts(EPOCH_MS + 1_000, 2).to_string();
        let c = Tsid::from_parts(EPOCH_MS + 1_001, 1).to_string();
        assert_eq!(a.len(), TSID_LEN);
        assert!(a < b && b < c);
    }

    #[test]
    fn tsid_encoding_is_bit_exact() {
        assert_eq!(Tsid::from_raw(0).to_string(), "0000000000000");
        assert_eq!(Tsid::from_raw(1).to_string(), "0000000000001");
        assert_eq!(Tsid::from_raw(32).to_string(), "0000000000010");
        assert_eq!(Tsid::from_raw(31).to_string(), "000000000000Z");
        let t = Tsid::from_parts(EPOCH_MS + 5, 3);
        assert_eq!(t.raw(), (5 << 22) | 3);
        assert_eq!(t.millis_since_epoch(), 5);
        assert_eq!(t.counter(), 3);
    }

    #[test]
    fn tsid_parse_inverts_display() {
        let t = Tsid::from_parts(EPOCH_MS + 123_456_789, 42);
        assert_eq!(Tsid::parse(&t.to_string()), Some(t));
        assert_eq!(Tsid::parse("short"), None);
        assert_eq!(Tsid::parse("000000000000I"), None);
    }

    #[test]
    fn key_builders() {
        assert_eq!(task_key("TEST", "00Q0P8XD40001"), "t-TEST-00Q0P8XD40001");
        assert_eq!(owner_key("TEST", "100"), "o-TEST-100");
        assert_eq!(offset_key("100", "TEST"), "f-100-TEST");
        assert_eq!(Prefix::Group.scan_part("12345"), "g-12345-");
        assert_eq!(
            group_key_for("t-TEST-00Q0P8XD40001", "12345").unwrap(),
            "g-12345-00Q0P8XD40001"
        );
        assert_eq!(error_id_for("t-TEST-00Q0P8XD40001"), "e-TEST-00Q0P8XD40001");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(split_key("t-a-b-c").is_none());
        assert!(split_key("t-a").is_none());
        assert!(matches!(
            group_key_for("t-my-kind-0001", "g"),
            Err(StoreError::MalformedKey(_))
        ));
    }
}
