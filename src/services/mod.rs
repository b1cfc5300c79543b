pub mod export;
pub mod library;
pub mod spotify;
pub mod tempo_filter;
