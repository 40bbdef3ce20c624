pub mod prepare;
pub mod run;
