//! Ledger entity and transaction identifiers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{VALID_START_MAX_OFFSET_NANOS, VALID_START_MIN_OFFSET_NANOS};

/// Identifier assigned to a consensus node in the address book.
pub type NodeId = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IdParseError {
    #[error("Invalid entity id '{0}': expected <shard>.<realm>.<num>")]
    InvalidEntityId(String),
    #[error("Invalid timestamp '{0}': expected <seconds>.<nanos>")]
    InvalidTimestamp(String),
    #[error("Invalid transaction id '{0}'")]
    InvalidTransactionId(String),
}

/// Account identifier in `shard.realm.num` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl AccountId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdParseError::InvalidEntityId(s.to_string());
        let mut parts = s.split('.');
        let (Some(shard), Some(realm), Some(num), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self {
            shard: shard.parse().map_err(|_| invalid())?,
            realm: realm.parse().map_err(|_| invalid())?,
            num: num.parse().map_err(|_| invalid())?,
        })
    }
}

/// Consensus timestamp with nanosecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Returns this timestamp shifted back by `nanos` nanoseconds.
    pub fn saturating_sub_nanos(&self, nanos: i64) -> Self {
        let total = (self.seconds as i128) * 1_000_000_000 + self.nanos as i128 - nanos as i128;
        let seconds = total.div_euclid(1_000_000_000) as i64;
        let nanos = total.rem_euclid(1_000_000_000) as u32;
        Self { seconds, nanos }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self {
            seconds: value.timestamp(),
            nanos: value.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

impl FromStr for Timestamp {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdParseError::InvalidTimestamp(s.to_string());
        let (seconds, nanos) = s.split_once('.').ok_or_else(invalid)?;
        let nanos: u32 = nanos.parse().map_err(|_| invalid())?;
        if nanos >= 1_000_000_000 {
            return Err(invalid());
        }
        Ok(Self {
            seconds: seconds.parse().map_err(|_| invalid())?,
            nanos,
        })
    }
}

/// Identifies a transaction by its payer and the moment it becomes valid.
///
/// Chunked submissions derive their follow-up ids from the first chunk through
/// [`TransactionId::child`], which keeps payer and valid start and sets a nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
    pub nonce: Option<u32>,
    pub scheduled: bool,
}

impl TransactionId {
    /// Generates a new id for `payer`.
    ///
    /// The valid start is pushed a few seconds into the past so that nodes whose
    /// clock runs slightly behind do not reject it as not yet valid.
    pub fn generate(payer: AccountId) -> Self {
        let offset =
            rand::rng().random_range(VALID_START_MIN_OFFSET_NANOS..VALID_START_MAX_OFFSET_NANOS);
        Self::with_valid_start(payer, Timestamp::now().saturating_sub_nanos(offset))
    }

    pub fn with_valid_start(payer: AccountId, valid_start: Timestamp) -> Self {
        Self {
            account_id: payer,
            valid_start,
            nonce: None,
            scheduled: false,
        }
    }

    /// Derives an id in the same payer/valid-start family carrying `nonce`.
    pub fn child(&self, nonce: u32) -> Self {
        Self {
            nonce: Some(nonce),
            ..*self
        }
    }

    /// Formats the id the way the mirror node REST API expects it
    /// (`0.0.2-1700000000-000000001`).
    pub fn to_mirror_string(&self) -> String {
        let mut id = format!(
            "{}-{}-{:09}",
            self.account_id, self.valid_start.seconds, self.valid_start.nanos
        );
        if let Some(nonce) = self.nonce {
            id.push_str(&format!("?nonce={nonce}"));
        }
        id
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)?;
        if self.scheduled {
            f.write_str("?scheduled")?;
        }
        if let Some(nonce) = self.nonce {
            write!(f, "/{nonce}")?;
        }
        Ok(())
    }
}

impl FromStr for TransactionId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdParseError::InvalidTransactionId(s.to_string());
        let (rest, nonce) = match s.rsplit_once('/') {
            Some((rest, nonce)) => (rest, Some(nonce.parse().map_err(|_| invalid())?)),
            None => (s, None),
        };
        let (rest, scheduled) = match rest.strip_suffix("?scheduled") {
            Some(rest) => (rest, true),
            None => (rest, false),
        };
        let (account, valid_start) = rest.split_once('@').ok_or_else(invalid)?;

        Ok(Self {
            account_id: account.parse()?,
            valid_start: valid_start.parse()?,
            nonce,
            scheduled,
        })
    }
}
