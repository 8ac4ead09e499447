pub mod dates;
pub mod estimate;
pub mod item;
pub mod token;
pub mod urgency;
