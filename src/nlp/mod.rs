//! Lightweight text analysis used by the token loader.

pub mod summarizer;

pub use summarizer::{TokenSummary, lemmatize, pos_tag, summarize, tokenize};
