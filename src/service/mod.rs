pub mod attendance;
pub mod audit;
pub mod directory;
pub mod history;
pub mod idgen;
pub mod salary;
pub mod timecalc;
