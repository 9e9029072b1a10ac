pub mod category;
pub mod movement;
pub mod report;
pub mod stock_item;
pub mod user;
