//! Read models maintained by subscribers.

pub mod dish_sales;
pub mod prepared_orders;

pub use dish_sales::{DishSales, DishSalesView};
pub use prepared_orders::{PreparedOrder, PreparedOrdersView};
