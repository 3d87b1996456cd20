pub mod cache;
pub mod clipboard;
pub mod download;
pub mod fetcher;
pub mod history;
pub mod navigator;
pub mod pool;
pub mod record;
pub mod settings;

#[cfg(test)]
pub mod testing;
