pub mod adapters;
pub mod bid;
pub mod demand;
pub mod pod;
