//! Message normalization: lemmatization dictionary and tokenizer.

mod lemmatizer;
mod tokenizer;

pub use lemmatizer::LemmaDictionary;
pub use tokenizer::Tokenizer;
