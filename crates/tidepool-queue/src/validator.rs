// SPDX-FileCopyrightText: 2026 Tidepool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content validation rules.
//!
//! [`ContentValidator::validate`] runs every rule against a candidate and
//! returns one [`ValidationResult`] per rule, in rule order. Rules never
//! short-circuit. Only error-severity results have `passed == false`.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use tidepool_config::model::ValidationConfig;
use tidepool_core::{ContentBody, ContentItem, Media, ValidationResult, ValidationRule};

/// Largest number of images in a carousel post.
const MAX_CAROUSEL_IMAGES: usize = 10;

/// Smallest number of images in a carousel post.
const MIN_CAROUSEL_IMAGES: usize = 2;

/// Captions longer than this are expected to mention the brand.
const BRAND_MENTION_LENGTH: usize = 100;

#[derive(Debug, Clone)]
pub struct ContentValidator {
    config: ValidationConfig,
}

impl ContentValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate `candidate` against the rules and against `existing` items.
    ///
    /// Only existing items in an active status take part in duplicate
    /// detection.
    pub fn validate(
        &self,
        candidate: &ContentBody,
        existing: &[ContentItem],
    ) -> Vec<ValidationResult> {
        vec![
            self.check_length(candidate),
            self.check_hashtag_count(candidate),
            check_media(&candidate.media),
            self.check_duplicates(candidate, existing),
            self.check_brand_compliance(candidate),
            self.check_platform_policy(candidate),
        ]
    }

    fn check_length(&self, body: &ContentBody) -> ValidationResult {
        let rule = ValidationRule::Length;
        let length = body.total_length();
        let max = self.config.max_caption_length;
        if length > max {
            ValidationResult::error(
                rule,
                format!("Caption is {length} characters, exceeds platform limit of {max}"),
            )
        } else if length > self.config.near_limit_length {
            ValidationResult::warning(
                rule,
                format!("Caption is {length} characters, near the limit of {max}"),
            )
        } else if length < self.config.min_caption_length {
            ValidationResult::warning(
                rule,
                format!("Caption is very short ({length} characters)"),
            )
        } else {
            ValidationResult::info(rule, format!("Caption length OK ({length} characters)"))
        }
    }

    fn check_hashtag_count(&self, body: &ContentBody) -> ValidationResult {
        let rule = ValidationRule::HashtagCount;
        let count = body.hashtags.len();
        let config = &self.config;
        if count > config.max_hashtags {
            ValidationResult::error(
                rule,
                format!("{count} hashtags exceeds the limit of {}", config.max_hashtags),
            )
        } else if count < config.min_hashtags {
            ValidationResult::warning(
                rule,
                format!(
                    "Only {count} hashtags, use at least {} for reach",
                    config.min_hashtags
                ),
            )
        } else if count >= config.saturation_hashtags {
            ValidationResult::warning(
                rule,
                format!("{count} hashtags may saturate the post"),
            )
        } else {
            ValidationResult::info(rule, format!("{count} hashtags"))
        }
    }

    fn check_duplicates(&self, body: &ContentBody, existing: &[ContentItem]) -> ValidationResult {
        let rule = ValidationRule::Duplicate;
        let active: Vec<&ContentItem> = existing
            .iter()
            .filter(|item| item.status.is_active())
            .collect();

        let own = fingerprint(body);
        if let Some(twin) = active.iter().find(|item| fingerprint(&item.body) == own) {
            return ValidationResult::error(rule, format!("Duplicate of content {}", twin.id));
        }

        let closest = active
            .iter()
            .map(|item| (jaccard_similarity(&body.caption, &item.body.caption), item))
            .max_by(|a, b| a.0.total_cmp(&b.0));
        match closest {
            Some((similarity, item)) if similarity > self.config.similarity_threshold => {
                ValidationResult::warning(
                    rule,
                    format!(
                        "Caption is {:.0}% similar to content {}",
                        similarity * 100.0,
                        item.id
                    ),
                )
            }
            _ => ValidationResult::info(rule, "No duplicate content found"),
        }
    }

    fn check_brand_compliance(&self, body: &ContentBody) -> ValidationResult {
        let rule = ValidationRule::BrandCompliance;
        let text = body.full_text().to_lowercase();
        let banned = matched_terms(&text, &self.config.banned_terms);
        if !banned.is_empty() {
            return ValidationResult::error(
                rule,
                format!("Contains banned terms: {}", banned.join(", ")),
            );
        }
        let mentions_brand = self
            .config
            .brand_keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()));
        if body.caption.chars().count() > BRAND_MENTION_LENGTH && !mentions_brand {
            ValidationResult::warning(rule, "Long caption does not mention any brand keyword")
        } else {
            ValidationResult::info(rule, "Brand compliant")
        }
    }

    fn check_platform_policy(&self, body: &ContentBody) -> ValidationResult {
        let rule = ValidationRule::PlatformPolicy;
        let text = body.full_text().to_lowercase();
        let restricted = matched_terms(&text, &self.config.restricted_terms);
        if restricted.is_empty() {
            ValidationResult::info(rule, "No platform policy violations")
        } else {
            ValidationResult::error(
                rule,
                format!("Violates platform policy: {}", restricted.join(", ")),
            )
        }
    }
}

fn check_media(media: &Media) -> ValidationResult {
    let rule = ValidationRule::Media;
    match media {
        Media::None => ValidationResult::info(rule, "Text-only post, no media attached"),
        Media::Image(url) if is_http_url(url) => ValidationResult::info(rule, "Image URL OK"),
        Media::Image(url) => {
            ValidationResult::error(rule, format!("Invalid image URL: {url:?}"))
        }
        Media::Carousel(urls) => {
            let count = urls.len();
            if !(MIN_CAROUSEL_IMAGES..=MAX_CAROUSEL_IMAGES).contains(&count) {
                ValidationResult::error(
                    rule,
                    format!(
                        "Carousel has {count} images, needs {MIN_CAROUSEL_IMAGES} to {MAX_CAROUSEL_IMAGES}"
                    ),
                )
            } else if let Some(bad) = urls.iter().find(|url| !is_http_url(url)) {
                ValidationResult::error(rule, format!("Invalid carousel image URL: {bad:?}"))
            } else {
                ValidationResult::info(rule, format!("Carousel with {count} images"))
            }
        }
    }
}

fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    ["http://", "https://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}

/// Terms from `terms` that occur in the already lower-cased `text`.
fn matched_terms(text: &str, terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|term| term.to_lowercase())
        .filter(|term| !term.is_empty() && text.contains(term.as_str()))
        .collect()
}

/// Deterministic hex SHA-256 over caption, media and hashtags.
pub fn fingerprint(body: &ContentBody) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.caption.as_bytes());
    hasher.update([0]);
    hasher.update(body.media.kind().as_bytes());
    for url in body.media.urls() {
        hasher.update([0]);
        hasher.update(url.as_bytes());
    }
    hasher.update([1]);
    for tag in &body.hashtags {
        hasher.update(tag.as_bytes());
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())
}

/// Jaccard similarity of the case-folded whitespace token sets of `a` and `b`.
///
/// Two empty captions are identical (1.0).
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
