pub mod browse;
pub mod contexts;
pub mod libs;
pub mod summary;
pub mod triage;
pub mod util;

pub use browse::*;
pub use contexts::*;
pub use libs::*;
pub use summary::*;
pub use triage::*;
pub use util::*;
