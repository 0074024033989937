pub mod dispatch;
pub mod payload;
pub mod recipient;
