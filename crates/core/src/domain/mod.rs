pub mod banner;
pub mod post;
pub mod price;
