//! Edital Search - keyword search core for public procurement notices
//!
//! Turns semicolon-separated user phrases into whole-word, accent-insensitive,
//! morphologically expanded matches over Portuguese procurement descriptions,
//! backed by SQLite, with highlighting that always agrees with what matched.

pub mod config;
pub mod database;
pub mod demo;
pub mod excerpt;
pub mod highlight;
pub mod interface;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod query;
pub mod relevance;
mod store;
pub mod variations;

pub use config::SearchConfig;
pub use database::{Database, DistinctField, EditalQuery};
pub use highlight::{color_for, highlight, render_highlighted, Highlighted};
pub use interface::*;
pub use matcher::KeywordMatcher;
pub use models::Edital;
pub use normalize::normalize;
pub use query::{compile, compile_search, parse_keywords, PredicateSet, QueryCompiler};
pub use relevance::{filter, post_process};
pub use store::{EditalSearch, SearchSession};
pub use variations::{variations, SuffixDictionary, VariationGenerator};
