//! Shopping cart module.
//!
//! Contains the cart types, their read model, and the per-user cart store.

mod cart;
mod service;
mod view;

pub use cart::{Cart, CartItem};
pub use service::CartService;
pub use view::{CartLineView, CartView};
