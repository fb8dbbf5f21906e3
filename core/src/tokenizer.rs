use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use scraper::{Html, Node};
use unicode_normalization::UnicodeNormalization;

use crate::config::EngineConfig;
use crate::error::{IndexError, Result};

lazy_static! {
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Extracts `(token, weight)` pairs from HTML, weighting tokens by the
/// structural element they appear in.
#[derive(Debug, Clone)]
pub struct WeightedTokenizer {
    re: Regex,
    title_boost: f32,
    heading_boost: f32,
    bold_boost: f32,
}

impl WeightedTokenizer {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let re = Regex::new(&config.token_regex)
            .map_err(|e| IndexError::Config(format!("invalid token_regex {:?}: {e}", config.token_regex)))?;
        Ok(Self {
            re,
            title_boost: config.title_boost,
            heading_boost: config.heading_boost,
            bold_boost: config.bold_boost,
        })
    }

    /// Visit every text node once; its weight is the highest boost among its ancestors.
    pub fn extract(&self, html: &str) -> Vec<(String, f32)> {
        let doc = Html::parse_document(html);
        let mut tokens = Vec::new();
        for node in doc.tree.root().descendants() {
            let Node::Text(text) = node.value() else { continue };
            let mut weight = 1.0f32;
            let mut hidden = false;
            for ancestor in node.ancestors() {
                let Some(el) = ancestor.value().as_element() else { continue };
                match el.name() {
                    "script" | "style" | "noscript" => hidden = true,
                    "title" => weight = weight.max(self.title_boost),
                    "h1" | "h2" | "h3" => weight = weight.max(self.heading_boost),
                    "b" | "strong" => weight = weight.max(self.bold_boost),
                    _ => {}
                }
            }
            if hidden {
                continue;
            }
            let raw: &str = text;
            let normalized = raw.nfkc().collect::<String>().to_lowercase();
            for mat in self.re.find_iter(&normalized) {
                tokens.push((mat.as_str().to_string(), weight));
            }
        }
        tokens
    }

    pub fn tokenize_html(&self, html: &str) -> Vec<(String, f32)> {
        normalize_and_stem(self.extract(html))
    }
}

/// Stem each token, keeping stop words and dropping empty stems.
pub fn normalize_and_stem(weighted_tokens: Vec<(String, f32)>) -> Vec<(String, f32)> {
    weighted_tokens
        .into_iter()
        .filter_map(|(token, weight)| {
            let stem = STEMMER.stem(&token).into_owned();
            (!stem.is_empty()).then_some((stem, weight))
        })
        .collect()
}
