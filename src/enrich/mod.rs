mod summarizer;
mod translator;

pub use summarizer::summarize;
pub use translator::Translator;
