use serde::{Deserialize, Serialize};

/// Generic reason recorded for links that answered with an HTTP error status.
pub const LINK_CHECK_FAILED: &str = "link check failed";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkupVersion {
    #[default]
    #[serde(rename = "HTML5")]
    Html5,
    #[serde(rename = "XHTML")]
    Xhtml,
}

impl MarkupVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkupVersion::Html5 => "HTML5",
            MarkupVersion::Xhtml => "XHTML",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HTML5" => Some(MarkupVersion::Html5),
            "XHTML" => Some(MarkupVersion::Xhtml),
            _ => None,
        }
    }
}

/// Per-level heading counters. Every level is always present, zero when unseen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCounts {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,
}

impl HeadingCounts {
    /// Maps a tag name such as `h3` to its level.
    pub fn level_of(tag: &str) -> Option<u8> {
        match tag {
            "h1" => Some(1),
            "h2" => Some(2),
            "h3" => Some(3),
            "h4" => Some(4),
            "h5" => Some(5),
            "h6" => Some(6),
            _ => None,
        }
    }

    pub fn increment(&mut self, level: u8) {
        if let Some(slot) = self.slot_mut(level) {
            *slot += 1;
        }
    }

    /// Count for `level` (1..=6); out of range levels read as zero.
    pub fn get(&self, level: u8) -> usize {
        match level {
            1 => self.h1,
            2 => self.h2,
            3 => self.h3,
            4 => self.h4,
            5 => self.h5,
            6 => self.h6,
            _ => 0,
        }
    }

    pub fn set(&mut self, level: u8, count: usize) {
        if let Some(slot) = self.slot_mut(level) {
            *slot = count;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        (1..=6).map(|level| (level, self.get(level)))
    }

    pub fn total(&self) -> usize {
        self.iter().map(|(_, count)| count).sum()
    }

    fn slot_mut(&mut self, level: u8) -> Option<&mut usize> {
        match level {
            1 => Some(&mut self.h1),
            2 => Some(&mut self.h2),
            3 => Some(&mut self.h3),
            4 => Some(&mut self.h4),
            5 => Some(&mut self.h5),
            6 => Some(&mut self.h6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub url: String,
    pub status_code: u16,
    pub reason: String,
}

impl BrokenLink {
    pub fn new(url: String, reason: impl Into<String>) -> Self {
        Self {
            url,
            status_code: 0,
            reason: reason.into(),
        }
    }
}

/// Everything learned about one page during a single analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub markup_version: MarkupVersion,
    pub heading_counts: HeadingCounts,
    pub internal_links: usize,
    pub external_links: usize,
    pub inaccessible_links: usize,
    pub has_login_form: bool,
    pub broken_links: Vec<BrokenLink>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a broken link and keeps the inaccessible counter in lockstep.
    pub fn record_broken(&mut self, link: BrokenLink) {
        self.broken_links.push(link);
        self.inaccessible_links += 1;
    }

    pub fn total_links(&self) -> usize {
        self.internal_links + self.external_links
    }
}
