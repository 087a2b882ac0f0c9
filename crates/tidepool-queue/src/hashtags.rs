// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in hashtag pools.

use async_trait::async_trait;
use tidepool_core::{HashtagCategory, HashtagOptimizer, TidepoolError};

const GENERAL: &[&str] = &[
    "aquascape",
    "aquascaping",
    "plantedtank",
    "aquarium",
    "natureaquarium",
    "aquariumplants",
    "aquaticplants",
    "plantedaquarium",
    "freshwateraquarium",
    "aquascapeaddicts",
    "aquascapedaily",
    "aquariumhobby",
    "fishtank",
    "tanklife",
    "scaping",
    "aquascaper",
    "hardscape",
    "naturestyle",
    "underwaterlandscape",
    "greenaquarium",
];

const AQUASCAPING: &[&str] = &[
    "iwagumi",
    "dutchaquarium",
    "junglestyle",
    "iaplc",
    "aquascapecontest",
    "dragonstone",
    "seiryustone",
    "spiderwood",
    "carpetplants",
    "mossscape",
];

const EDUCATION: &[&str] = &[
    "aquariumtips",
    "aquariumscience",
    "nitrogencycle",
    "waterchemistry",
    "plantcare",
    "fishcare",
    "co2injection",
    "aquariumlighting",
    "algaecontrol",
    "learnaquascaping",
];

const TUTORIAL: &[&str] = &[
    "aquascapetutorial",
    "howtoaquascape",
    "aquascapingtips",
    "tanksetup",
    "plantingguide",
    "diyaquarium",
    "beginneraquascaper",
    "aquascapeprocess",
];

const COMMUNITY: &[&str] = &[
    "aquascapecommunity",
    "aquariumcommunity",
    "fishkeepers",
    "plantedtankcommunity",
    "aquascapersofinstagram",
    "tankoftheweek",
    "shareyourtank",
];

const PRODUCTS: &[&str] = &[
    "aquariumgear",
    "aquasoil",
    "aquariumfilter",
    "co2system",
    "aquariumlight",
    "aquascapingtools",
    "aquariumfertilizer",
];

/// Curated hashtags for `category`: its own pool first, then the general pool.
pub fn pool(category: HashtagCategory) -> Vec<&'static str> {
    let specific: &[&str] = match category {
        HashtagCategory::Aquascaping => AQUASCAPING,
        HashtagCategory::Education => EDUCATION,
        HashtagCategory::Tutorial => TUTORIAL,
        HashtagCategory::Community => COMMUNITY,
        HashtagCategory::Products => PRODUCTS,
        HashtagCategory::General => &[],
    };
    let mut tags: Vec<&'static str> = Vec::with_capacity(specific.len() + GENERAL.len());
    for tag in specific.iter().chain(GENERAL) {
        if !tags.contains(tag) {
            tags.push(*tag);
        }
    }
    tags
}

/// Offline [`HashtagOptimizer`] serving the curated pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct CuratedHashtags;

#[async_trait]
impl HashtagOptimizer for CuratedHashtags {
    async fn suggest(
        &self,
        category: HashtagCategory,
        _caption: &str,
        count: usize,
    ) -> Result<Vec<String>, TidepoolError> {
        Ok(pool(category)
            .into_iter()
            .take(count)
            .map(String::from)
            .collect())
    }
}
