//! Content policy for community descriptions and banners

use regex::Regex;

use crate::types::{BumpError, Result};

/// Minimum description length, in characters, after trimming
pub const MIN_DESCRIPTION_CHARS: usize = 400;

/// URL shorteners, IP loggers and adult sites
const FORBIDDEN_DOMAINS: &str = r"\bhttps?://(?:[^\s/$.?#]+\.)?(iplogger?|bitly|tinyurl|goo\.gl|ow\.ly|t\.co|is\.gd|buff\.ly|adf\.ly|tiny\.cc|lnkd\.in|db\.tt|qr\.ae|adfoc\.us|bit\.do|tiny\.pl|cur\.lv|ity\.im|q\.gs|po\.st|bc\.vc|twitthis\.com|u\.to|j\.mp|buzurl\.com|cutt\.us|u\.bb|yourls\.org|x\.co|prettylinkpro\.com|scrnch\.me|filoops\.info|vzturl\.com|qr\.net|1url\.com|tweez\.me|v\.gd|tr\.im|link\.zip\.net|pornhub\.com|xvideos\.com|redtube\.com|youporn\.com|xnxx\.com|porn\.com|xhamster\.com|tube8\.com|beeg\.com|spankbang\.com)\b[^\s]*";

const LINK: &str = r"https?://[^\s]+";

const BANNER: &str = r"^https?://.+";

/// Why a configuration was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigRejection {
    DescriptionTooShort { chars: usize },
    ForbiddenLink,
    InvalidBanner,
}

impl ConfigRejection {
    pub fn message(&self) -> String {
        match self {
            ConfigRejection::DescriptionTooShort { chars } => format!(
                "The description must contain at least {} characters ({} given).",
                MIN_DESCRIPTION_CHARS, chars
            ),
            ConfigRejection::ForbiddenLink => "The provided link is forbidden.".to_string(),
            ConfigRejection::InvalidBanner => "The banner link is not valid.".to_string(),
        }
    }
}

/// Accepted, trimmed configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityProfile {
    pub description: String,
    pub banner_link: String,
}

/// Compiled content rules
pub struct ContentPolicy {
    forbidden: Regex,
    link: Regex,
    banner: Regex,
}

impl ContentPolicy {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| BumpError::Internal(format!("Invalid content pattern: {}", e)))
        };
        Ok(Self {
            forbidden: compile(FORBIDDEN_DOMAINS)?,
            link: compile(LINK)?,
            banner: compile(BANNER)?,
        })
    }

    /// Check a description and optional banner link
    pub fn check(
        &self,
        description: &str,
        banner_link: &str,
    ) -> std::result::Result<CommunityProfile, ConfigRejection> {
        let description = description.trim();
        let banner_link = banner_link.trim();

        let chars = description.chars().count();
        if chars < MIN_DESCRIPTION_CHARS {
            return Err(ConfigRejection::DescriptionTooShort { chars });
        }

        let forbidden = self
            .link
            .find_iter(description)
            .map(|m| m.as_str())
            .chain((!banner_link.is_empty()).then_some(banner_link))
            .any(|link| self.forbidden.is_match(link));
        if forbidden {
            return Err(ConfigRejection::ForbiddenLink);
        }

        if !banner_link.is_empty() && !self.banner.is_match(banner_link) {
            return Err(ConfigRejection::InvalidBanner);
        }

        Ok(CommunityProfile {
            description: description.to_string(),
            banner_link: banner_link.to_string(),
        })
    }
}
