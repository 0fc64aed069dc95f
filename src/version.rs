/// Crate version reported at startup and in `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
