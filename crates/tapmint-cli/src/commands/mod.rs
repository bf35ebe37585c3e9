mod collections;
mod mint;

pub use self::collections::CollectionsCommand;
pub use self::mint::MintCommand;
