use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::{Directive, LevelFilter};

/// Global log level, for example `info`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLevel(pub LevelFilter);

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed: LevelFilter = s
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid log level: {s}"))?;
        Ok(Self(parsed))
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel(LevelFilter::INFO)
    }
}

impl From<LogLevel> for Directive {
    fn from(val: LogLevel) -> Self {
        val.0.into()
    }
}

/// Level of a single module, for example `pubky_name::namesys=debug`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetLevel(pub Directive);

impl FromStr for TargetLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains('=') {
            anyhow::bail!("module level must look like `target=level`: {s}");
        }
        let parsed = s
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid module level: {s}"))?;
        Ok(Self(parsed))
    }
}

impl Display for TargetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TargetLevel> for Directive {
    fn from(val: TargetLevel) -> Self {
        val.0
    }
}

/// String (de)serialization through `Display` and `FromStr`.
macro_rules! serde_via_str {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_via_str!(LogLevel);
serde_via_str!(TargetLevel);
