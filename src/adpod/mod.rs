pub mod assembler;
pub mod auction;
pub mod bucket;
pub mod combination;
pub mod duration;
pub mod error;
pub mod exclusion;
