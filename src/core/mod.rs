pub mod disposal;
pub mod events;
pub mod input;
pub mod rounding;
pub mod transaction;

pub use disposal::{DisposalMatch, MatchKind};
pub use events::{AssetEvent, AssetEventKind};
pub use input::{CalculatorInput, InputError};
pub use transaction::{Transaction, TransactionKind, TransactionToMatch};
