//! Core building blocks: file corpus, entity extraction, token math

pub mod ast;
pub mod cache;
pub mod corpus;
pub mod parser;
pub mod tokens;
