mod build;
mod format;
mod transpile;

pub use build::build;
pub use format::{format, FormatError, FormattingOption};
pub use transpile::transpile;
