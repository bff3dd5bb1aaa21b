pub mod analyze;
pub mod anonymize;
pub mod export;
pub mod import;
pub mod preprocess;
