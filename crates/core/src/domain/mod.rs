pub mod product;
pub mod quote;
pub mod user;
