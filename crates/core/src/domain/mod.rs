pub mod answer;
pub mod approval;
pub mod phase;
pub mod process;
