pub mod live;
pub mod pages;

pub use live::{LiveProjector, PLACEHOLDER, ProjectedAnswer};
pub use pages::paginate;
