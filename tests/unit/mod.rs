pub mod error_tests;
pub mod splitter_tests;
