//! Family-tree engine configuration loaded from environment variables.

use std::str::FromStr;

use crate::error::CoreError;

/// Minimum accepted share token length.
pub const MIN_SHARE_TOKEN_LENGTH: usize = 16;

/// Maximum accepted share token length.
pub const MAX_SHARE_TOKEN_LENGTH: usize = 128;

/// Longest accepted default share TTL: ten years.
pub const MAX_SHARE_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

/// Which non-biological edges count as ancestry.
///
/// Counted edges take part in cycle detection and generation inheritance.
/// Biological `parent`/`child` edges always count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AncestryPolicy {
    pub include_step: bool,
    pub include_adopted: bool,
}

/// Default canvas spacing for members the user never placed by hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Vertical distance between two generations.
    pub generation_spacing: f64,
    /// Horizontal distance between members of one generation.
    pub member_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            generation_spacing: 160.0,
            member_spacing: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareConfig {
    pub token_length: usize,
    /// Applied when a share request carries no explicit expiry.
    pub default_ttl_hours: Option<i64>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            token_length: 32,
            default_ttl_hours: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FamilyTreeConfig {
    pub ancestry: AncestryPolicy,
    pub layout: LayoutConfig,
    pub share: ShareConfig,
}

impl FamilyTreeConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `FAMILY_TREE_COUNT_STEP_RELATIONS`| `false` |
    /// | `FAMILY_TREE_COUNT_ADOPTIONS`     | `false` |
    /// | `FAMILY_TREE_GENERATION_SPACING`  | `160.0` |
    /// | `FAMILY_TREE_MEMBER_SPACING`      | `200.0` |
    /// | `SHARE_TOKEN_LENGTH`              | `32`    |
    /// | `SHARE_TOKEN_TTL_HOURS`           | unset   |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ancestry = AncestryPolicy {
            include_step: parse_bool(&lookup, "FAMILY_TREE_COUNT_STEP_RELATIONS")?
                .unwrap_or(defaults.ancestry.include_step),
            include_adopted: parse_bool(&lookup, "FAMILY_TREE_COUNT_ADOPTIONS")?
                .unwrap_or(defaults.ancestry.include_adopted),
        };

        let layout = LayoutConfig {
            generation_spacing: parse_var(&lookup, "FAMILY_TREE_GENERATION_SPACING")?
                .unwrap_or(defaults.layout.generation_spacing),
            member_spacing: parse_var(&lookup, "FAMILY_TREE_MEMBER_SPACING")?
                .unwrap_or(defaults.layout.member_spacing),
        };
        if !(layout.generation_spacing > 0.0 && layout.member_spacing > 0.0) {
            return Err(CoreError::Validation(
                "Layout spacing values must be positive".to_string(),
            ));
        }

        let token_length = parse_var(&lookup, "SHARE_TOKEN_LENGTH")?
            .unwrap_or(defaults.share.token_length);
        if !(MIN_SHARE_TOKEN_LENGTH..=MAX_SHARE_TOKEN_LENGTH).contains(&token_length) {
            return Err(CoreError::Validation(format!(
                "SHARE_TOKEN_LENGTH must be between {MIN_SHARE_TOKEN_LENGTH} and \
                 {MAX_SHARE_TOKEN_LENGTH}, got {token_length}"
            )));
        }

        let default_ttl_hours: Option<i64> = parse_var(&lookup, "SHARE_TOKEN_TTL_HOURS")?;
        if let Some(hours) = default_ttl_hours {
            if !(1..=MAX_SHARE_TOKEN_TTL_HOURS).contains(&hours) {
                return Err(CoreError::Validation(format!(
                    "SHARE_TOKEN_TTL_HOURS must be between 1 and {MAX_SHARE_TOKEN_TTL_HOURS}, \
                     got {hours}"
                )));
            }
        }

        Ok(Self {
            ancestry,
            layout,
            share: ShareConfig {
                token_length,
                default_ttl_hours,
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CoreError::Validation(format!("{key} has an invalid value: '{raw}'"))),
    }
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>, CoreError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(CoreError::Validation(format!(
                "{key} must be a boolean, got '{v}'"
            ))),
        },
    }
}
