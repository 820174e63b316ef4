//! Fact extraction from command output.
//!
//! The `parse_*` functions are pure and work on raw command text; the
//! `collect_*` functions issue the commands over a [`DeviceSession`] first.

use std::fmt;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, ExtractError};
use crate::extract::TemplateParser;
use crate::session::DeviceSession;

pub const SHOW_VERSION: &str = "show version";
pub const SHOW_INVENTORY: &str = "show inventory";
pub const SHOW_CDP: &str = "show cdp";
pub const SHOW_CDP_NEIGHBORS_DETAIL: &str = "show cdp neighbors detail";

/// Platform reported when `show inventory` has no `PID:` line.
pub const UNDEFINED_PLATFORM: &str = "UNDEFINED";

/// Substring of the image name that marks an NPE build.
const NPE_MARKER: &str = "npe";

static VERSION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Cisco IOS.*\(([^()]+)\), Version ([^,]+),.*$")
        .unwrap_or_else(|e| panic!("invalid version pattern: {e}"))
});

static PID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PID:\s+(\S+)\s*,").unwrap_or_else(|e| panic!("invalid PID pattern: {e}"))
});

/// Image build classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageClass {
    #[serde(rename = "NPE")]
    Npe,
    #[serde(rename = "PE")]
    Pe,
}

impl fmt::Display for ImageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Npe => write!(f, "NPE"),
            Self::Pe => write!(f, "PE"),
        }
    }
}

/// Software version facts from `show version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionFacts {
    pub version: String,
    pub image: String,
    pub class: ImageClass,
}

/// Neighbor discovery (CDP) facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NeighborFacts {
    pub enabled: bool,
    /// Number of neighbors; `None` when discovery is disabled.
    pub count: Option<usize>,
}

impl NeighborFacts {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            count: None,
        }
    }
}

impl fmt::Display for NeighborFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.enabled, self.count) {
            (false, _) => write!(f, "OFF"),
            (true, Some(count)) => write!(f, "ON, neighbor count {count}"),
            (true, None) => write!(f, "ON, neighbor count none"),
        }
    }
}

/// Parse the image and version from `show version` output.
pub fn parse_version(output: &str) -> Result<VersionFacts, ExtractError> {
    let caps = VERSION_LINE
        .captures(output)
        .ok_or(ExtractError::PatternNotFound { fact: "version" })?;

    let image = caps[1].trim().to_string();
    let class = if image.contains(NPE_MARKER) {
        ImageClass::Npe
    } else {
        ImageClass::Pe
    };

    Ok(VersionFacts {
        version: caps[2].trim().to_string(),
        image,
        class,
    })
}

/// Parse the chassis PID from the second line of `show inventory` output.
///
/// Returns [`UNDEFINED_PLATFORM`] when that line has no `PID:` field.
pub fn parse_platform(output: &str) -> String {
    output
        .lines()
        .nth(1)
        .and_then(|line| PID_LINE.captures(line.trim_start()))
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| UNDEFINED_PLATFORM.to_string())
}

/// Check `show cdp` output for the disabled marker.
pub fn cdp_disabled(output: &str) -> bool {
    output.contains("CDP is not enabled")
}

/// Count neighbors in `show cdp neighbors detail` output.
///
/// The count is the number of records the template yields.
pub fn parse_neighbors(
    parser: &dyn TemplateParser,
    template: &str,
    detail: &str,
) -> Result<NeighborFacts, ExtractError> {
    let records = parser.parse(template, detail)?;
    Ok(NeighborFacts {
        enabled: true,
        count: Some(records.len()),
    })
}

/// Issue `show version` and parse it.
pub async fn collect_version(session: &mut impl DeviceSession) -> Result<VersionFacts, Error> {
    let output = session.send_command(SHOW_VERSION).await?;
    let facts = parse_version(&output)?;
    debug!("version {} image {} ({})", facts.version, facts.image, facts.class);
    Ok(facts)
}

/// Issue `show inventory` and parse it.
pub async fn collect_platform(session: &mut impl DeviceSession) -> Result<String, Error> {
    let output = session.send_command(SHOW_INVENTORY).await?;
    Ok(parse_platform(&output))
}

/// Issue `show cdp` and, when enabled, the detailed neighbor query.
pub async fn collect_neighbors(
    session: &mut impl DeviceSession,
    parser: &dyn TemplateParser,
    template: &str,
) -> Result<NeighborFacts, Error> {
    let status = session.send_command(SHOW_CDP).await?;
    if cdp_disabled(&status) {
        return Ok(NeighborFacts::disabled());
    }

    let detail = session.send_command(SHOW_CDP_NEIGHBORS_DETAIL).await?;
    Ok(parse_neighbors(parser, template, &detail)?)
}
