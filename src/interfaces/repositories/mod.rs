pub mod product;
pub mod sqlx_repo;
