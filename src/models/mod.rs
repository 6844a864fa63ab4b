pub mod black_scholes;
pub mod hull_white;
