use std::{fmt, ops::Deref, str::FromStr};

use anyhow::{bail, Context, Result};

use crate::utils::{hex_decode, hex_encode};

/// 20-byte identifier of a content swarm. Ordered lexicographically; the
/// leading bits select the owning bucket.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InfoHash(pub [u8; 20]);

impl FromStr for InfoHash {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let mut out = [0u8; 20];

        if bytes.len() != 40 {
            bail!("`{s}` is not a valid infohash.");
        }

        for pos in 0..20 {
            out[pos] = hex_decode([bytes[pos * 2], bytes[pos * 2 + 1]])
                .with_context(|| format!("`{s}` is not a valid infohash."))?;
        }

        Ok(InfoHash(out))
    }
}

impl From<[u8; 20]> for InfoHash {
    fn from(array: [u8; 20]) -> Self {
        InfoHash(array)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        for pos in 0..20 {
            let digits = hex_encode(self.0[pos]);
            write!(fmt, "{}{}", char::from(digits[0]), char::from(digits[1]))?;
        }

        Ok(())
    }
}

impl Deref for InfoHash {
    type Target = [u8; 20];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_40_hex_digits() {
        let hash: InfoHash = "000102030405060708090a0b0c0d0e0f10111213"
            .parse()
            .unwrap();

        assert_eq!(hash.0[0], 0x00);
        assert_eq!(hash.0[10], 0x0A);
        assert_eq!(hash.0[19], 0x13);
    }

    #[test]
    fn rejects_wrong_length_and_non_hex() {
        assert!("abcdef".parse::<InfoHash>().is_err());
        assert!("zz0102030405060708090a0b0c0d0e0f10111213"
            .parse::<InfoHash>()
            .is_err());
    }

    #[test]
    fn displays_lowercase_hex() {
        let hash = InfoHash([0xAB; 20]);

        assert_eq!(hash.to_string(), "ab".repeat(20));
        assert_eq!(hash.to_string().parse::<InfoHash>().unwrap(), hash);
    }

    #[test]
    fn orders_lexicographically() {
        let low = InfoHash([0x00; 20]);
        let mut high = low;
        high.0[19] = 1;

        assert!(low < high);
    }
}
