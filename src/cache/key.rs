//! Typed cache keys for the four detail kinds
//!
//! Keys travel as strings (`"movie:550:detail"`) at the API boundary and are
//! parsed into a [`CacheKey`] before any tier is touched.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Suffix shared by every detail key
const DETAIL_SUFFIX: &str = "detail";

/// Errors produced when a caller-supplied key is malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key string was empty
    #[error("Cache key is empty")]
    Empty,

    /// The key prefix does not name a known detail kind
    #[error("Unknown cache key prefix '{0}'. Valid prefixes: show, season, movie, person")]
    UnknownKind(String),

    /// The key has the wrong shape for its kind
    #[error("Malformed cache key '{0}'")]
    Malformed(String),

    /// An id segment is not a valid unsigned number
    #[error("Invalid id '{segment}' in cache key '{key}'")]
    InvalidId { key: String, segment: String },

    /// The key belongs to a different detail kind than the cache it was given to
    #[error("Cache key '{key}' is a {actual} key, expected a {expected} key")]
    WrongKind {
        key: String,
        expected: EntityKind,
        actual: EntityKind,
    },
}

/// The four kinds of detail record, one cache instance each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Show,
    Season,
    Movie,
    Person,
}

impl EntityKind {
    /// All kinds, in a stable order
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Show,
        EntityKind::Season,
        EntityKind::Movie,
        EntityKind::Person,
    ];

    /// Directory name used for this kind's disk namespace
    pub fn namespace(&self) -> &'static str {
        match self {
            EntityKind::Show => "ShowDetail",
            EntityKind::Season => "SeasonDetail",
            EntityKind::Movie => "MovieDetail",
            EntityKind::Person => "PersonDetail",
        }
    }

    /// Leading segment of this kind's keys
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Show => "show",
            EntityKind::Season => "season",
            EntityKind::Movie => "movie",
            EntityKind::Person => "person",
        }
    }

    /// Parses a key prefix into a kind
    pub fn from_prefix(s: &str) -> Option<Self> {
        match s {
            "show" => Some(EntityKind::Show),
            "season" => Some(EntityKind::Season),
            "movie" => Some(EntityKind::Movie),
            "person" => Some(EntityKind::Person),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A validated detail cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Show { id: u64 },
    Season { tv_id: u64, season_number: u32 },
    Movie { id: u64 },
    Person { id: u64 },
}

impl CacheKey {
    pub fn show(id: u64) -> Self {
        CacheKey::Show { id }
    }

    pub fn season(tv_id: u64, season_number: u32) -> Self {
        CacheKey::Season {
            tv_id,
            season_number,
        }
    }

    pub fn movie(id: u64) -> Self {
        CacheKey::Movie { id }
    }

    pub fn person(id: u64) -> Self {
        CacheKey::Person { id }
    }

    /// Returns the detail kind this key belongs to
    pub fn kind(&self) -> EntityKind {
        match self {
            CacheKey::Show { .. } => EntityKind::Show,
            CacheKey::Season { .. } => EntityKind::Season,
            CacheKey::Movie { .. } => EntityKind::Movie,
            CacheKey::Person { .. } => EntityKind::Person,
        }
    }

    /// Filesystem-safe name for this key's disk record (without extension)
    pub fn file_stem(&self) -> String {
        self.to_string().replace(':', "-")
    }

    /// Fails with [`KeyError::WrongKind`] unless this key is of `expected` kind
    pub fn expect_kind(&self, expected: EntityKind) -> Result<(), KeyError> {
        let actual = self.kind();
        if actual == expected {
            Ok(())
        } else {
            Err(KeyError::WrongKind {
                key: self.to_string(),
                expected,
                actual,
            })
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Show { id } => write!(f, "show:{}:{}", id, DETAIL_SUFFIX),
            CacheKey::Season {
                tv_id,
                season_number,
            } => write!(f, "season:{}:{}:{}", tv_id, season_number, DETAIL_SUFFIX),
            CacheKey::Movie { id } => write!(f, "movie:{}:{}", id, DETAIL_SUFFIX),
            CacheKey::Person { id } => write!(f, "person:{}:{}", id, DETAIL_SUFFIX),
        }
    }
}

fn parse_id<T: FromStr>(key: &str, segment: &str) -> Result<T, KeyError> {
    // `u64::from_str` accepts a leading '+', which would give one id two spellings
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(KeyError::InvalidId {
            key: key.to_string(),
            segment: segment.to_string(),
        });
    }
    segment.parse().map_err(|_| KeyError::InvalidId {
        key: key.to_string(),
        segment: segment.to_string(),
    })
}

impl FromStr for CacheKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(KeyError::Empty);
        }

        let segments: Vec<&str> = s.split(':').collect();
        let kind = EntityKind::from_prefix(segments[0])
            .ok_or_else(|| KeyError::UnknownKind(segments[0].to_string()))?;

        let expected_len = match kind {
            EntityKind::Season => 4,
            _ => 3,
        };
        if segments.len() != expected_len || segments[expected_len - 1] != DETAIL_SUFFIX {
            return Err(KeyError::Malformed(s.to_string()));
        }

        let key = match kind {
            EntityKind::Show => CacheKey::Show {
                id: parse_id(s, segments[1])?,
            },
            EntityKind::Season => CacheKey::Season {
                tv_id: parse_id(s, segments[1])?,
                season_number: parse_id(s, segments[2])?,
            },
            EntityKind::Movie => CacheKey::Movie {
                id: parse_id(s, segments[1])?,
            },
            EntityKind::Person => CacheKey::Person {
                id: parse_id(s, segments[1])?,
            },
        };

        Ok(key)
    }
}
