pub mod builder;
pub mod nbr;
pub mod vast;
