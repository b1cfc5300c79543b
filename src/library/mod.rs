pub mod cache;
pub mod session;
pub mod track;
