mod check_record;
mod license;
mod product;

pub use check_record::*;
pub use license::*;
pub use product::*;
