//! Scoring engine
//!
//! Turns an analysis triple into a total and a human-readable summary. The
//! summary is a pure function of the three sub-scores: the same triple always
//! yields the same text, however noisy the upstream analysis is.

use dropboard_common::models::{AnalysisTriple, ScoreCard};
use dropboard_common::{Error, Result};

/// Lowest accepted sub-score
pub const MIN_SUB_SCORE: i64 = 1;
/// Highest accepted sub-score
pub const MAX_SUB_SCORE: i64 = 50;
/// Highest possible total (three perfect sub-scores)
pub const MAX_TOTAL_SCORE: u32 = 150;

/// Qualitative band of a sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    /// 1-16
    Low,
    /// 17-33
    Mid,
    /// 34-50
    High,
}

impl Band {
    pub fn of(sub_score: u32) -> Self {
        match sub_score {
            0..=16 => Band::Low,
            17..=33 => Band::Mid,
            _ => Band::High,
        }
    }
}

/// Validate the triple and compute total and summary
pub fn score(analysis: &AnalysisTriple) -> Result<ScoreCard> {
    let size_score = validate("size", analysis.size)?;
    let color_score = validate("color", analysis.color)?;
    let texture_score = validate("texture", analysis.texture)?;
    let total_score = size_score + color_score + texture_score;

    Ok(ScoreCard {
        size_score,
        color_score,
        texture_score,
        total_score,
        analysis_text: analysis_text(size_score, color_score, texture_score),
    })
}

fn validate(field: &'static str, value: i64) -> Result<u32> {
    if (MIN_SUB_SCORE..=MAX_SUB_SCORE).contains(&value) {
        Ok(value as u32)
    } else {
        Err(Error::InvalidAnalysisInput { field, value })
    }
}

/// Summary text for an already validated triple
pub fn analysis_text(size: u32, color: u32, texture: u32) -> String {
    let total = size + color + texture;
    format!(
        "Your poop scored {total}/{MAX_TOTAL_SCORE}! Size: {size}/{MAX_SUB_SCORE} - {}. \
         Color: {color}/{MAX_SUB_SCORE} - {}. Texture: {texture}/{MAX_SUB_SCORE} - {}.",
        size_phrase(Band::of(size)),
        color_phrase(Band::of(color)),
        texture_phrase(Band::of(texture)),
    )
}

fn size_phrase(band: Band) -> &'static str {
    match band {
        Band::Low => "Modest volume, there is room to grow",
        Band::Mid => "Solid volume and respectable girth",
        Band::High => "Good volume and impressive girth",
    }
}

fn color_phrase(band: Band) -> &'static str {
    match band {
        Band::Low => "Unusual tone, consider more fiber and water",
        Band::Mid => "Decent brown tone with room for improvement",
        Band::High => "Healthy brown tone indicates good digestion",
    }
}

fn texture_phrase(band: Band) -> &'static str {
    match band {
        Band::Low => "Consistency needs some work",
        Band::Mid => "Reasonable consistency overall",
        Band::High => "Perfect consistency for optimal elimination",
    }
}
