//! Out-of-band uncertainty selection over recent generations

mod buffer;
mod selector;

pub use buffer::{BufferedGeneration, UncertaintyBuffer};
pub use selector::{select_uncertain, select_uncertain_by_name, UncertaintySelector};
