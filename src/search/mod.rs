pub mod aho_corasick;
pub mod scanner;
