use serde::{Deserialize, Serialize};

/// Bullet classification for one description line. Negative bullets mark
/// exclusions, positive bullets inclusions; unmarked lines are plain text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulletMarker {
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "+")]
    Plus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionLine {
    pub marker: Option<BulletMarker>,
    pub text: String,
}

/// Splits a free-text line-item description into ordered display lines.
///
/// CRM descriptions mix real line breaks with inline ` - ` / ` + ` bullets,
/// so inline bullets are first broken onto their own lines. Whitespace runs
/// collapse to single spaces and empty lines are dropped. Recomputed fresh
/// from the source text on every call; purely for display grouping, no
/// numeric role.
pub fn parse_description_lines(text: &str) -> Vec<DescriptionLine> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let broken = normalized.replace(" - ", "\n- ").replace(" + ", "\n+ ");

    broken
        .lines()
        .filter_map(|line| {
            let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if collapsed.is_empty() {
                return None;
            }
            let (marker, text) = if let Some(rest) = collapsed.strip_prefix("- ") {
                (Some(BulletMarker::Minus), rest.to_string())
            } else if let Some(rest) = collapsed.strip_prefix("+ ") {
                (Some(BulletMarker::Plus), rest.to_string())
            } else {
                (None, collapsed)
            };
            Some(DescriptionLine { marker, text })
        })
        .collect()
}
