pub mod declare;
pub mod run;
pub mod specs;
pub mod variables;
