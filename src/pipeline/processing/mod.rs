// Pipeline processing: tokenizing, parsing, normalization, assembly and reconciliation

pub mod assembler;
pub mod catalog;
pub mod format;
pub mod normalize;
pub mod parser;
pub mod tokenizer;
