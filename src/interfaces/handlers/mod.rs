pub mod home;
pub mod media;
pub mod products;
pub mod system;
