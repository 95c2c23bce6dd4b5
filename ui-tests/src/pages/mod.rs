pub mod dashboard;
pub mod recent_sales;
