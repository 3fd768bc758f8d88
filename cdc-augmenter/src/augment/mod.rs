mod augmenter;
pub mod convert;
pub mod row_key;

pub use augmenter::RowAugmenter;
